//! Per-route attribute requirement.
//!
//! ```ignore
//! let admin = Router::new()
//!     .route("/admin", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         AttributeRequirement::new("role", "admin"),
//!         require_attribute,
//!     ));
//! ```
//!
//! Must run inside the session gate, which attaches the [`Identity`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, Identity};

/// An attribute value the caller must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRequirement {
    pub name: String,
    pub value: String,
}

impl AttributeRequirement {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Reject requests whose identity lacks the required attribute value.
pub async fn require_attribute(
    State(requirement): State<AttributeRequirement>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        return Err(AuthError::Forbidden(format!(
            "{}={} required but request has no identity",
            requirement.name, requirement.value
        )));
    };

    if !identity.has_attribute_value(&requirement.name, &requirement.value) {
        return Err(AuthError::Forbidden(format!(
            "subject {:?} lacks {}={}",
            identity.subject, requirement.name, requirement.value
        )));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware::{Next, from_fn, from_fn_with_state},
        routing::get,
    };
    use chrono::Utc;
    use rstest::rstest;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::claims::Attributes;

    fn app(roles: Option<Vec<&'static str>>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(
                AttributeRequirement::new("role", "admin"),
                require_attribute,
            ))
            .layer(from_fn(move |mut req: Request<Body>, next: Next| {
                let roles = roles.clone();
                async move {
                    if let Some(roles) = roles {
                        let mut attributes = Attributes::new();
                        attributes.insert(
                            "role".into(),
                            roles.into_iter().map(String::from).collect(),
                        );
                        req.extensions_mut().insert(Identity {
                            subject: Some("alice".into()),
                            attributes,
                            expires_at: Utc::now(),
                        });
                    }
                    next.run(req).await
                }
            }))
    }

    #[rstest]
    #[case::no_identity(None, StatusCode::FORBIDDEN)]
    #[case::missing_value(Some(vec!["user"]), StatusCode::FORBIDDEN)]
    #[case::empty_values(Some(vec![]), StatusCode::FORBIDDEN)]
    #[case::has_value(Some(vec!["user", "admin"]), StatusCode::OK)]
    #[tokio::test]
    async fn test_require_attribute(
        #[case] roles: Option<Vec<&'static str>>,
        #[case] expected: StatusCode,
    ) {
        let response = app(roles)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}
