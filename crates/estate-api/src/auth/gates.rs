//! # Gate Stages
//!
//! A protected route carries a [`Guard`]: an ordered list of [`Stage`]s
//! evaluated against the request's identity before the handler runs. The
//! first failing stage short-circuits with its error; a route with no guard
//! is public.
//!
//! | Stage            | Failure                    |
//! |------------------|----------------------------|
//! | `Authenticated`  | 401 authentication required |
//! | `Activated`      | 403 account inactive        |
//! | `Permission(c)`  | 403 permission denied       |

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use estate_core::Identity;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::PermissionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The request must carry a valid token.
    Authenticated,
    /// The account must be activated.
    Activated,
    /// The account must hold this permission code.
    Permission(&'static str),
}

/// An ordered list of stages.
#[derive(Debug, Clone)]
pub struct Guard {
    stages: Arc<[Stage]>,
}

impl Guard {
    pub fn new(stages: impl Into<Arc<[Stage]>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    /// Authenticated and activated.
    pub fn activated() -> Self {
        Self::new([Stage::Authenticated, Stage::Activated])
    }

    /// Authenticated, activated and holding `code`.
    pub fn permission(code: &'static str) -> Self {
        Self::new([Stage::Authenticated, Stage::Activated, Stage::Permission(code)])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order against `identity`.
    pub async fn evaluate(
        &self,
        identity: &Identity,
        permissions: &dyn PermissionStore,
    ) -> Result<(), AppError> {
        for stage in self.stages.iter() {
            let user = identity.user().ok_or(AppError::AuthenticationRequired)?;
            match *stage {
                Stage::Authenticated => {}
                Stage::Activated => {
                    if !user.activated {
                        return Err(AppError::AccountInactive);
                    }
                }
                Stage::Permission(code) => {
                    let granted = permissions.permissions_for(user.id).await?;
                    if !granted.includes(code) {
                        tracing::warn!(user_id = user.id, permission = code, "permission denied");
                        return Err(AppError::PermissionDenied);
                    }
                }
            }
        }
        Ok(())
    }
}

/// A guard bound to the permission store it consults.
#[derive(Clone)]
pub struct Gate {
    guard: Guard,
    permissions: Arc<dyn PermissionStore>,
}

impl Gate {
    pub fn new(state: &AppState, guard: Guard) -> Self {
        Self {
            guard,
            permissions: state.models.permissions.clone(),
        }
    }
}

/// Wrap `route` so `gate` runs before its handler.
pub fn protect(route: MethodRouter<AppState>, gate: Gate) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(gate, require))
}

async fn require(State(gate): State<Gate>, request: Request, next: Next) -> Response {
    let Some(identity) = request.extensions().get::<Identity>().cloned() else {
        return AppError::Internal("no identity in request context".into()).into_response();
    };
    match gate.guard.evaluate(&identity, gate.permissions.as_ref()).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}
