//! Admin session authentication.
//!
//! The dashboard sends a bearer token; the token is the id of a session
//! document. A session is seeded at first startup and printed to the
//! console; there is no login flow in this service.

use anyhow::anyhow;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use metrics::counter;

use crate::gateway::Gateway as _;
use crate::models::{Session, SESSION_COLLECTION};
use crate::{AppState, Error};

/// An authenticated admin, extracted from the Authorization header.
pub struct AdminSession {
    uid: String,
}

impl AdminSession {
    /// The admin's uid, recorded in audit trails.
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|auth| auth.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .ok_or_else(|| {
                counter!(crate::metrics::AUTH_FAILED).increment(1);
                Error::unauthorized(anyhow!("no bearer token provided"))
            })?;

        let doc = state
            .gateway
            .fetch_by_id(SESSION_COLLECTION, token)
            .await
            .map_err(Error::from)?;

        match doc {
            Some(doc) => {
                let session: Session = doc.decode().map_err(Error::from)?;
                Ok(Self { uid: session.uid })
            }
            None => {
                counter!(crate::metrics::AUTH_FAILED).increment(1);
                Err(Error::unauthorized(anyhow!("unknown session token")))
            }
        }
    }
}
