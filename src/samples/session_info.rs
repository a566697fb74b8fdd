//! Log in, show what the session looks like, confirm the server still
//! accepts it, log out.

use vas_core::pipeline::{SamplePipeline, StepFuture};
use vas_core::types::SessionSummary;
use vas_core::SessionContext;

#[derive(Debug, Default)]
pub struct SessionInfo {
    pub summary: Option<SessionSummary>,
    pub valid: bool,
}

pub fn pipeline() -> SamplePipeline<SessionInfo> {
    SamplePipeline::new("session-info", SessionInfo::default()).run(inspect)
}

fn inspect<'a>(session: &'a SessionContext, state: &'a mut SessionInfo) -> StepFuture<'a> {
    Box::pin(async move {
        state.summary = Some(session.summary());
        state.valid = session.check_session().await?;
        Ok(())
    })
}

impl SessionInfo {
    pub fn report(&self) -> String {
        let Some(s) = &self.summary else {
            return "no session".into();
        };
        let mut out = format!("Server:            {}\n", s.server);
        out += &format!("Login:             {}\n", if s.federated { "federated (SAML bearer)" } else { "direct" });
        if let Some(idp) = &s.identity_provider {
            out += &format!("Identity provider: {idp}\n");
        }
        out += &format!("Created:           {}\n", s.created_at);
        out += &format!("TLS verification:  {}\n", if s.skip_tls_verification { "off" } else { "on" });
        out += &format!("Server accepts it: {}", if self.valid { "yes" } else { "no" });
        out
    }
}
