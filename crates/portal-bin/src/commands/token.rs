// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `token issue` and `token verify` commands.

use portal_api::{Claims, JwtConfig, RbacPolicy, TokenService};
use portal_core::{Permission, Principal, SystemClock, TokenKind};

use crate::cli::{Cli, OutputFormat, TokenIssueArgs, TokenVerifyArgs};
use crate::error::{BinError, BinResult};

/// Signs an access token with the configured secret.
pub fn issue_token(cli: &Cli, args: TokenIssueArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let token = issue_with(config.api.jwt, &args)?;

    match args.format {
        OutputFormat::Text => println!("{}", token.token),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "token": token.token, "claims": token.claims })
        ),
    }
    Ok(())
}

/// Verifies a token and prints its claims.
pub fn verify_token(cli: &Cli, args: TokenVerifyArgs) -> BinResult<()> {
    let config = super::load(cli)?;
    let claims = verify_with(config.api.jwt, &args.token, args.kind.into())?;

    match args.format {
        OutputFormat::Text => print_claims(&claims),
        OutputFormat::Json => println!("{}", serde_json::json!({ "valid": true, "claims": claims })),
    }
    Ok(())
}

pub(crate) fn issue_with(jwt: JwtConfig, args: &TokenIssueArgs) -> BinResult<portal_api::auth::IssuedToken> {
    let extra = args
        .permissions
        .iter()
        .map(|p| Permission::parse(p).map_err(|e| BinError::input(e.to_string())))
        .collect::<BinResult<Vec<_>>>()?;

    let policy = RbacPolicy::new();
    let permissions = policy.resolve(&args.roles, &extra);

    let mut principal = Principal::new(&args.subject)
        .with_roles(args.roles.iter().cloned())
        .with_permissions(permissions);
    if let Some(email) = &args.email {
        principal = principal.with_email(email);
    }

    let tokens = TokenService::new(jwt, SystemClock::shared());
    Ok(tokens.issue_claims(&principal, TokenKind::Access)?)
}

pub(crate) fn verify_with(jwt: JwtConfig, token: &str, kind: TokenKind) -> BinResult<Claims> {
    let tokens = TokenService::new(jwt, SystemClock::shared());
    Ok(tokens.verify(token.trim(), kind)?.claims)
}

fn print_claims(claims: &Claims) {
    println!("✓ Valid {} token", claims.typ);
    println!("  Subject:     {}", claims.sub);
    println!("  Token ID:    {}", claims.jti);
    println!("  Issuer:      {}", claims.iss);
    if let Some(issued) = claims.issued_at() {
        println!("  Issued at:   {}", issued.to_rfc3339());
    }
    if let Some(expires) = claims.expires_at() {
        println!("  Expires at:  {}", expires.to_rfc3339());
    }
    if let Some(email) = &claims.email {
        println!("  Email:       {}", email);
    }
    if !claims.roles.is_empty() {
        let roles: Vec<&str> = claims.roles.iter().map(String::as_str).collect();
        println!("  Roles:       {}", roles.join(", "));
    }
    if !claims.permissions.is_empty() {
        let permissions: Vec<&str> = claims.permissions.iter().map(Permission::as_str).collect();
        println!("  Permissions: {}", permissions.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_api::TokenError;

    fn jwt() -> JwtConfig {
        JwtConfig::new(
            "access-secret-access-secret-0123",
            "refresh-secret-refresh-secret-01",
        )
    }

    fn args(roles: &[&str], permissions: &[&str]) -> TokenIssueArgs {
        TokenIssueArgs {
            subject: "u-1".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            email: Some("u1@example.com".to_string()),
            format: OutputFormat::Text,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let issued = issue_with(jwt(), &args(&["editor"], &["reports:export"])).unwrap();
        let claims = verify_with(jwt(), &issued.token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.typ, TokenKind::Access);
        assert!(claims.roles.contains("editor"));
        assert!(claims
            .permissions
            .contains(&Permission::parse("reports:export").unwrap()));
        assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
    }

    #[test]
    fn test_verify_as_refresh_fails() {
        let issued = issue_with(jwt(), &args(&[], &[])).unwrap();
        let err = verify_with(jwt(), &issued.token, TokenKind::Refresh).unwrap_err();
        assert!(matches!(err, BinError::Token(_)));
    }

    #[test]
    fn test_issue_without_secret() {
        let err = issue_with(JwtConfig::default(), &args(&[], &[])).unwrap_err();
        assert!(matches!(
            err,
            BinError::Token(TokenError::MissingSecret { kind: TokenKind::Access })
        ));
    }

    #[test]
    fn test_bad_permission_rejected() {
        let err = issue_with(jwt(), &args(&[], &["no-colon"])).unwrap_err();
        assert!(matches!(err, BinError::Input(_)));
    }
}
