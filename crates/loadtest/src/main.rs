use goose::prelude::*;
use serde_json::Value;
use std::env;

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn password_grant(password: String) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "password".to_string()),
        ("client_id", env_or("LOADTEST_CLIENT_ID", "C1")),
        ("client_secret", env_or("LOADTEST_CLIENT_SECRET", "S1")),
        ("username", env_or("LOADTEST_USERNAME", "a@example.com")),
        ("password", password),
    ]
}

/// True when `body` is a token response carrying a bearer access token.
fn is_bearer_token(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .is_ok_and(|json| json["token_type"] == "Bearer" && json["access_token"].is_string())
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn issue_token(user: &mut GooseUser) -> TransactionResult {
    let params = password_grant(env_or("LOADTEST_PASSWORD", "hunter22"));
    let mut goose = user.post_form("/api/v1/oauth/token", &params).await?;

    let body = match goose.response {
        Ok(response) if response.status() == 200 => response.text().await.ok(),
        _ => None,
    };
    if !body.as_deref().is_some_and(is_bearer_token) {
        return user.set_failure("token not issued", &mut goose.request, None, None);
    }
    Ok(())
}

/// Wrong password; measures how long a rejected login costs the server.
async fn reject_bad_password(user: &mut GooseUser) -> TransactionResult {
    let params = password_grant("definitely-wrong".to_string());
    let mut goose = user.post_form("/api/v1/oauth/token", &params).await?;

    match &goose.response {
        Ok(response) if response.status() == 401 => user.set_success(&mut goose.request),
        _ => user.set_failure("expected invalid_grant", &mut goose.request, None, None),
    }
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    println!(
        "Issuing tokens for {} through client {}",
        env_or("LOADTEST_USERNAME", "a@example.com"),
        env_or("LOADTEST_CLIENT_ID", "C1")
    );

    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("PasswordGrant")
                .register_transaction(transaction!(issue_token).set_weight(3)?)
                .register_transaction(transaction!(reject_bad_password)),
        )
        .execute()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_body() {
        assert!(is_bearer_token(
            r#"{"token_type":"Bearer","expires_in":3600,"access_token":"abc","refresh_token":null}"#
        ));
        assert!(!is_bearer_token(r#"{"error":"invalid_grant"}"#));
        assert!(!is_bearer_token(r#"{"token_type":"Bearer","access_token":null}"#));
        assert!(!is_bearer_token("<html>502 Bad Gateway</html>"));
    }

    #[test]
    fn test_os_username_is_not_picked_up() {
        env::set_var("USERNAME", "jdoe");
        env::remove_var("LOADTEST_USERNAME");

        let params = password_grant("pw".to_string());
        let username = params.iter().find(|(k, _)| *k == "username").map(|(_, v)| v.as_str());
        assert_eq!(username, Some("a@example.com"));
    }
}
