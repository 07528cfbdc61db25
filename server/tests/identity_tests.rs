/// End-to-end tests for identity resolution and shareable links.
///
/// Property tests cover the codecs; the HTTP tests drive the real router
/// behind the identity layer with `tower::ServiceExt::oneshot`.
use std::sync::Arc;

use server::security::{FixedClock, IdentityResolver, TokenCodec, TokenKeys};

const PRIVATE_PEM: &str = include_str!("fixtures/private.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/public.pem");
const OTHER_PRIVATE_PEM: &str = include_str!("fixtures/other_private.pem");
const OTHER_PUBLIC_PEM: &str = include_str!("fixtures/other_public.pem");

const NOW: i64 = 1_700_000_000;

fn keys() -> TokenKeys {
    TokenKeys::from_pem(Some(PRIVATE_PEM.as_bytes()), Some(PUBLIC_PEM.as_bytes())).unwrap()
}

fn codec() -> TokenCodec {
    TokenCodec::new(keys()).with_clock(Arc::new(FixedClock(NOW)))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------
mod properties {
    use super::*;
    use proptest::prelude::*;
    use server::security::{id_codec, scope_suffix};
    use shared::types::{Account, ScopeFields};

    proptest! {
        #[test]
        fn opaque_ids_roundtrip(id in 0..=id_codec::MAX_ID) {
            let encoded = id_codec::obfuscate(id).unwrap();
            prop_assert_eq!(id_codec::deobfuscate(&encoded), id);
            if id > 0 {
                prop_assert_eq!(id_codec::try_deobfuscate(&encoded).unwrap(), id);
            }
        }

        #[test]
        fn scope_suffix_roundtrips(
            bare in "[A-Za-z0-9._-]{1,40}",
            company in any::<i64>(),
            branch in any::<i64>(),
            department in any::<i64>(),
            diff_hour in -24.0f64..24.0,
        ) {
            let scope = ScopeFields::new(company, branch, department, diff_hour);
            let token = scope_suffix::append(&bare, &scope);
            let (parsed_bare, parsed) = scope_suffix::parse(&token);
            prop_assert_eq!(parsed_bare, bare.as_str());
            prop_assert_eq!(parsed, scope);
        }

        #[test]
        fn signed_accounts_roundtrip(
            id in 1i64..i64::MAX,
            partner_id in any::<i64>(),
            device_id in any::<i64>(),
            account_type in any::<i32>(),
            name in "[a-z]{1,12}",
        ) {
            let account = Account {
                id,
                username: Some(name.clone()),
                partner_id,
                full_name: name,
                device_id,
                account_type,
                ..Account::default()
            };
            let c = codec();
            let token = c.generate_access(&account).unwrap();
            prop_assert_eq!(c.verify_account(&token).unwrap(), account);
        }
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------
mod scenarios {
    use super::*;
    use server::security::{AuthError, link_checksum};
    use shared::types::{Account, DIFF_HOUR_UNSET, ScopeFields};

    fn account() -> Account {
        Account {
            id: 501,
            username: Some("carol".into()),
            partner_id: 12,
            partner_code: "P12".into(),
            diff_hour: 7.0,
            ..Account::default()
        }
    }

    #[test]
    fn suffix_offset_overrides_login_offset() {
        let resolver = IdentityResolver::new(codec());
        let token = resolver.tokens().generate_access(&account()).unwrap();

        let with_offset = resolver
            .resolve(&format!("Bearer {}|||1|2|3|-3.5", token))
            .unwrap();
        assert_eq!(with_offset.diff_hour, -3.5);

        let without_offset = resolver
            .resolve(&format!("Bearer {}|||1|2|3", token))
            .unwrap();
        assert_eq!(without_offset.diff_hour, 7.0);
        assert_eq!(without_offset.partner_code, "P12");
    }

    #[test]
    fn suffix_is_outside_the_signature() {
        let resolver = IdentityResolver::new(codec());
        let credential = resolver
            .issue_access_token(&account(), &ScopeFields::new(1, 2, 3, DIFF_HOUR_UNSET))
            .unwrap();

        let rescoped = credential.replace("|||1|2|3", "|||9|9|9");
        let identity = resolver.resolve(&rescoped).unwrap();
        assert_eq!(identity.user_id, 501);
        assert_eq!(identity.company_id, 9);
    }

    #[test]
    fn token_from_another_key_is_malformed() {
        let foreign = TokenKeys::from_pem(Some(OTHER_PRIVATE_PEM.as_bytes()), None).unwrap();
        let token = TokenCodec::new(foreign).generate_access(&account()).unwrap();

        let resolver = IdentityResolver::new(codec());
        assert!(matches!(
            resolver.resolve(&format!("Bearer {}", token)),
            Err(AuthError::TokenMalformed(_))
        ));
    }

    #[test]
    fn rotated_verification_key_rejects_old_tokens() {
        let token = codec().generate_access(&account()).unwrap();
        let rotated = TokenCodec::new(TokenKeys::verify_only(OTHER_PUBLIC_PEM.as_bytes()).unwrap())
            .with_clock(Arc::new(FixedClock(NOW)));
        assert!(matches!(
            rotated.verify(&token),
            Err(AuthError::TokenMalformed(_))
        ));
    }

    #[test]
    fn verify_only_keys_cannot_issue() {
        let codec = TokenCodec::new(TokenKeys::verify_only(PUBLIC_PEM.as_bytes()).unwrap());
        assert!(matches!(
            codec.generate_access(&account()),
            Err(AuthError::KeyNotConfigured(_))
        ));
    }

    #[test]
    fn refresh_tokens_never_expire() {
        let token = codec().generate_refresh(&account()).unwrap();
        let later = TokenCodec::new(keys()).with_clock(Arc::new(FixedClock(NOW * 2)));
        assert!(later.verify(&token).unwrap().is_refresh());
    }

    #[test]
    fn access_token_expires_after_ttl() {
        let token = codec().with_access_ttl(60).generate_access(&account()).unwrap();

        let at_expiry = TokenCodec::new(keys()).with_clock(Arc::new(FixedClock(NOW + 60)));
        assert!(at_expiry.verify(&token).is_ok());

        let after = TokenCodec::new(keys()).with_clock(Arc::new(FixedClock(NOW + 61)));
        assert_eq!(after.verify(&token).unwrap_err(), AuthError::TokenExpired);
    }

    #[test]
    fn checksum_ignores_order_but_not_values() {
        let link = link_checksum::signed_link("/doc/file/v1/view", &[("b", "2"), ("a", "1")]);
        assert!(link_checksum::verify(&link));

        // Parameter order does not matter, values do.
        let reordered = {
            let (path, query) = link.split_once('?').unwrap();
            let mut pairs: Vec<&str> = query.split('&').collect();
            pairs.reverse();
            format!("{}?{}", path, pairs.join("&"))
        };
        assert!(link_checksum::verify(&reordered));
        assert!(!link_checksum::verify(&link.replace("a=1", "a=3")));
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------
mod http_surface {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::{Request, Response, StatusCode};
    use server::handlers::http::routes::build_router;
    use server::handlers::http::utils::JsonBody;
    use server::tower_middle::IdentityLayer;
    use server::{AppState, dispatch};
    use shared::config::parse_config;
    use shared::types::{Account, ScopeFields};
    use tower::{ServiceBuilder, ServiceExt, service_fn};

    const CONFIG: &str = r#"
[server]
bind = "127.0.0.1"

[auth]
public_key_path = "unused.pem"
public_paths = ["/health", "/orbit/:id", "/doc/file/v1/:method", "/links/verify"]
"#;

    fn state() -> AppState {
        AppState::new(parse_config(CONFIG).unwrap(), codec())
    }

    async fn call(state: &AppState, req: Request<()>) -> (StatusCode, serde_json::Value) {
        let router = Arc::new(build_router(&state.config.links));
        let inner_state = state.clone();
        let svc = ServiceBuilder::new()
            .layer(IdentityLayer::new(
                state.resolver.clone(),
                state.config.auth.public_paths.clone(),
            ))
            .service(service_fn(move |req: Request<()>| {
                dispatch(router.clone(), inner_state.clone(), req)
            }));

        let res: Response<JsonBody> = svc.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    fn get_as(uri: &str, credential: &str) -> Request<()> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", credential))
            .header("x-forwarded-host", "app.example.com")
            .header("x-forwarded-scheme", "https")
            .body(())
            .unwrap()
    }

    fn credential(state: &AppState) -> String {
        let account = Account {
            id: 88,
            username: Some("dave".into()),
            ..Account::default()
        };
        state
            .resolver
            .issue_access_token(&account, &ScopeFields::new(4, 5, 6, 1.0))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, json) = call(&state(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
    }

    #[tokio::test]
    async fn whoami_requires_credential() {
        let (status, json) = call(&state(), get("/whoami")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "SYS.MSG.UNAUTHENTICATED_ERROR");
    }

    #[tokio::test]
    async fn whoami_returns_merged_identity() {
        let state = state();
        let cred = credential(&state);
        let (status, json) = call(&state, get_as("/whoami", &cred)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["userId"], 88);
        assert_eq!(json["data"]["username"], "dave");
        assert_eq!(json["data"]["companyId"], 4);
        assert_eq!(json["data"]["departmentId"], 6);
        assert_eq!(json["data"]["diffHour"], 1.0);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let (status, json) = call(&state(), get_as("/whoami", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "SYS.MSG.VALIDATION_MALFORMED_ERROR");
    }

    #[tokio::test]
    async fn qr_link_lands_on_original_id() {
        let state = state();
        let cred = credential(&state);
        let (status, json) = call(&state, get_as("/links/qr/12345", &cred)).await;
        assert_eq!(status, StatusCode::OK);

        let url = json["data"]["url"].as_str().unwrap().to_string();
        let path = url.strip_prefix("https://app.example.com").unwrap();
        assert!(path.starts_with("/orbit/"));

        let (status, json) = call(&state, get(path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["id"], 12345);
    }

    #[tokio::test]
    async fn bad_opaque_id_is_rejected() {
        let (status, json) = call(&state(), get("/orbit/0OIl")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "SYS.MSG.INVALID_ARGUMENT_ERROR");
    }

    #[tokio::test]
    async fn document_link_carries_grant() {
        let state = state();
        let cred = credential(&state);
        let (status, json) = call(&state, get_as("/links/doc/31?method=view", &cred)).await;
        assert_eq!(status, StatusCode::OK);

        let url = json["data"]["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/doc/file/v1/view?"));

        let (status, json) = call(&state, get(&url)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["method"], "view");
        assert_eq!(json["data"]["documentId"], 31);
        assert_eq!(json["data"]["userId"], 88);
    }

    #[tokio::test]
    async fn tampered_document_link_is_forbidden() {
        let state = state();
        let link = state
            .links
            .build_doc_url_with_full_path("/reports/q1.pdf", Default::default());
        let tampered = link.replace("q1", "q2");

        let (status, _) = call(&state, get(&link)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = call(&state, get(&tampered)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "SYS.MSG.INVALID_CHECKSUM");
    }

    #[tokio::test]
    async fn verify_endpoint_reports_validity() {
        let state = state();
        let link = state
            .links
            .build_doc_url_with_token(1, "t", Default::default());
        let encoded: String = form_urlencoded::byte_serialize(link.as_bytes()).collect();

        let (status, json) = call(&state, get(&format!("/links/verify?url={}", encoded))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["valid"], true);

        let bad: String =
            form_urlencoded::byte_serialize(link.replace("id=1", "id=2").as_bytes()).collect();
        let (_, json) = call(&state, get(&format!("/links/verify?url={}", bad))).await;
        assert_eq!(json["data"]["valid"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let state = state();
        let cred = credential(&state);
        let (status, json) = call(&state, get_as("/nope", &cred)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "SYS.MSG.NOT_FOUND");
    }
}
