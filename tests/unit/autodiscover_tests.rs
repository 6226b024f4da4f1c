use crate::support::{
    MockTransport, pox_settings_response, soap_fault, test_config, user_redirect_response,
    user_settings_response,
};
use anyhow::Result;
use async_trait::async_trait;
use fast_ews_rs::autodiscover::{SrvRecord, SrvResolver};
use fast_ews_rs::{
    AutodiscoverService, ClientConfig, EwsError, ExchangeCredentials, ExchangeService,
    ExchangeVersion, UserSettingName,
};
use hyper::{Method, header};
use std::sync::Arc;

const DOMAIN_SVC: &str = "https://contoso.com/autodiscover/autodiscover.svc";
const AUTODISCOVER_SVC: &str = "https://autodiscover.contoso.com/autodiscover/autodiscover.svc";
const AUTODISCOVER_XML: &str = "https://autodiscover.contoso.com/autodiscover/autodiscover.xml";
const PROBE_URL: &str = "http://autodiscover.contoso.com/autodiscover/autodiscover.xml";
const EXTERNAL_EWS: &str = "https://mail.contoso.com/EWS/Exchange.asmx";

const EWS_SETTINGS: [UserSettingName; 2] =
    [UserSettingName::ExternalEwsUrl, UserSettingName::InternalEwsUrl];

fn service(transport: &Arc<MockTransport>, config: ClientConfig) -> AutodiscoverService {
    let mut service = AutodiscoverService::with_transport(transport.clone(), config);
    service.set_credentials(ExchangeCredentials::basic("jane@contoso.com", "secret"));
    service
}

fn ews_settings() -> String {
    user_settings_response(&[("ExternalEwsUrl", EXTERNAL_EWS)])
}

#[tokio::test]
async fn test_first_candidate_answers() {
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("settings should resolve");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(response.email, "jane@contoso.com");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert!(requests[0].headers.contains_key(header::AUTHORIZATION));
    assert!(requests[0].body.contains("<a:Mailbox>jane@contoso.com</a:Mailbox>"));
    assert!(requests[0].body.contains("<a:Setting>ExternalEwsUrl</a:Setting>"));
}

#[tokio::test]
async fn test_network_failure_moves_to_next_candidate() {
    let transport = MockTransport::new();
    transport.fail(DOMAIN_SVC, "dns lookup failed");
    transport.respond(AUTODISCOVER_SVC, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("second candidate should answer");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls(), vec![DOMAIN_SVC, AUTODISCOVER_SVC]);
}

#[tokio::test]
async fn test_unauthorized_is_reported_when_nothing_succeeds() {
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 401, "");
    transport.respond(AUTODISCOVER_SVC, 500, "oops");

    let err = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect_err("no candidate succeeds");

    assert!(matches!(EwsError::find(&err), Some(EwsError::Unauthorized)));
}

#[tokio::test]
async fn test_unauthorized_candidate_does_not_stop_the_chain() {
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 401, "");
    transport.respond(AUTODISCOVER_SVC, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("a later candidate succeeds");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
}

#[tokio::test]
async fn test_http_redirect_is_followed() {
    let target = "https://autodiscover-s.outlook.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 302, target);
    transport.respond(target, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("redirect target answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls(), vec![DOMAIN_SVC, target]);
}

#[tokio::test]
async fn test_relative_location_is_resolved_against_the_request() {
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 301, "/ad/autodiscover.svc");
    transport.respond("https://contoso.com/ad/autodiscover.svc", 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("relative redirect target answers");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
}

#[tokio::test]
async fn test_insecure_redirect_is_rejected() {
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 302, "http://evil.example.com/autodiscover/autodiscover.svc");
    transport.respond(AUTODISCOVER_SVC, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("second candidate answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert!(!transport.urls().iter().any(|u| u.contains("evil.example.com")));
}

#[tokio::test]
async fn test_custom_validator_can_allow_targets() {
    let target = "http://legacy.contoso.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 302, target);
    transport.respond(target, 200, &ews_settings());

    let mut autodiscover = service(&transport, test_config());
    autodiscover.set_redirection_url_validator(|uri| {
        uri.host().is_some_and(|host| host.ends_with("contoso.com"))
    });
    let response = autodiscover
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("validator allows the target");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
}

#[tokio::test]
async fn test_redirect_loop_is_not_revisited() {
    let other = "https://other.contoso.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 302, other);
    transport.redirect(other, 302, DOMAIN_SVC);
    transport.respond(AUTODISCOVER_SVC, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("loop is abandoned and the next candidate answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls(), vec![DOMAIN_SVC, other, AUTODISCOVER_SVC]);
}

#[tokio::test]
async fn test_redirect_hops_are_bounded() {
    let hops = [
        "https://a.contoso.com/autodiscover/autodiscover.svc",
        "https://b.contoso.com/autodiscover/autodiscover.svc",
        "https://c.contoso.com/autodiscover/autodiscover.svc",
        "https://d.contoso.com/autodiscover/autodiscover.svc",
    ];
    let transport = MockTransport::new();
    transport.redirect(DOMAIN_SVC, 302, hops[0]);
    for pair in hops.windows(2) {
        transport.redirect(pair[0], 302, pair[1]);
    }

    let config = ClientConfig {
        max_redirections: 2,
        ..test_config()
    };
    let err = service(&transport, config)
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect_err("redirect chain is too long");

    assert!(matches!(EwsError::find(&err), Some(EwsError::RedirectLimit)));
    assert!(!transport.urls().iter().any(|u| u == hops[2]));
}

#[tokio::test]
async fn test_missing_soap_endpoint_falls_back_to_pox() {
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 404, "");
    transport.fail("https://contoso.com/autodiscover/autodiscover.xml", "connection reset");
    transport.respond(AUTODISCOVER_SVC, 405, "");
    transport.respond(AUTODISCOVER_XML, 200, &pox_settings_response(EXTERNAL_EWS));

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("POX endpoint answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(response.get(UserSettingName::UserDisplayName), Some("Jane Doe"));
    let last = transport.requests().pop().unwrap();
    assert_eq!(last.url, AUTODISCOVER_XML);
    assert!(last.body.contains("<EMailAddress>jane@contoso.com</EMailAddress>"));
}

#[tokio::test]
async fn test_exchange_2007_uses_pox_from_the_start() {
    let transport = MockTransport::new();
    transport.respond(
        "https://contoso.com/autodiscover/autodiscover.xml",
        200,
        &pox_settings_response(EXTERNAL_EWS),
    );

    let config = ClientConfig {
        requested_version: ExchangeVersion::Exchange2007Sp1,
        ..test_config()
    };
    let response = service(&transport, config)
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("POX answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert!(!transport.urls().iter().any(|u| u.ends_with(".svc")));
}

#[tokio::test]
async fn test_exchange_2007_stays_on_pox_after_redirect() {
    let mail_xml = "https://mail.contoso.com/autodiscover/autodiscover.xml";
    let transport = MockTransport::new();
    transport.redirect(
        "https://contoso.com/autodiscover/autodiscover.xml",
        302,
        "https://mail.contoso.com/autodiscover/autodiscover.svc",
    );
    transport.respond(mail_xml, 200, &pox_settings_response(EXTERNAL_EWS));

    let config = ClientConfig {
        requested_version: ExchangeVersion::Exchange2007Sp1,
        ..test_config()
    };
    let response = service(&transport, config)
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("redirect target answers over POX");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls().last().map(String::as_str), Some(mail_xml));
    assert!(!transport.urls().iter().any(|u| u.ends_with(".svc")));
    assert!(!transport.last_body().contains("GetUserSettingsRequestMessage"));
}

#[tokio::test]
async fn test_redirect_address_restarts_discovery() {
    let fabrikam = "https://fabrikam.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 200, &user_redirect_response("RedirectAddress", "jane@fabrikam.com"));
    transport.respond(fabrikam, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("redirected address resolves");

    assert_eq!(response.email, "jane@fabrikam.com");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert!(transport.last_body().contains("<a:Mailbox>jane@fabrikam.com</a:Mailbox>"));
}

#[tokio::test]
async fn test_redirect_address_loop_is_an_error() {
    let fabrikam = "https://fabrikam.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 200, &user_redirect_response("RedirectAddress", "jane@fabrikam.com"));
    transport.respond(fabrikam, 200, &user_redirect_response("RedirectAddress", "jane@contoso.com"));

    let err = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect_err("addresses redirect to each other");
    assert!(matches!(EwsError::find(&err), Some(EwsError::RedirectLimit)));
}

#[tokio::test]
async fn test_redirect_url_is_followed() {
    let target = "https://ad.contoso.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 200, &user_redirect_response("RedirectUrl", target));
    transport.respond(target, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("RedirectUrl target answers");

    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls(), vec![DOMAIN_SVC, target]);
}

#[tokio::test]
async fn test_http_redirect_probe_names_the_next_host() {
    let hosted = "https://autodiscover.hosted.example.net/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.redirect(
        PROBE_URL,
        302,
        "https://autodiscover.hosted.example.net/autodiscover/autodiscover.xml",
    );
    transport.respond(hosted, 200, &ews_settings());

    let response = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("probe leads to the hosted endpoint");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));

    let probe = transport
        .requests()
        .into_iter()
        .find(|r| r.url == PROBE_URL)
        .expect("probe was sent");
    assert_eq!(probe.method, Method::GET);
    assert!(!probe.headers.contains_key(header::AUTHORIZATION));
}

struct StaticSrv(Vec<SrvRecord>);

#[async_trait]
impl SrvResolver for StaticSrv {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<SrvRecord>> {
        assert_eq!(name, "_autodiscover._tcp.contoso.com");
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_srv_record_is_the_last_resort() {
    let srv_host = "https://ad-srv.contoso.net/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.respond(srv_host, 200, &ews_settings());

    let mut autodiscover = service(&transport, test_config());
    autodiscover.set_srv_resolver(Arc::new(StaticSrv(vec![
        SrvRecord {
            priority: 10,
            weight: 0,
            port: 443,
            target: "backup.contoso.net.".into(),
        },
        SrvRecord {
            priority: 0,
            weight: 10,
            port: 443,
            target: "ad-srv.contoso.net.".into(),
        },
    ])));

    let response = autodiscover
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("SRV host answers");
    assert_eq!(response.ews_url(), Some(EXTERNAL_EWS));
    assert_eq!(transport.urls().last().map(String::as_str), Some(srv_host));
}

#[tokio::test]
async fn test_autodiscover_error_code_is_surfaced() {
    let body = user_redirect_response("InvalidUser", "");
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 200, &body);
    transport.respond(AUTODISCOVER_SVC, 200, &body);

    let err = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect_err("user is unknown everywhere");

    match EwsError::find(&err) {
        Some(EwsError::Autodiscover(error)) => assert_eq!(error.code, "InvalidUser"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_soap_fault_is_a_candidate_failure() {
    let transport = MockTransport::new();
    transport.respond(DOMAIN_SVC, 500, &soap_fault("ErrorInternalServerError", None));
    transport.respond(AUTODISCOVER_SVC, 500, &soap_fault("ErrorInternalServerError", None));

    let err = service(&transport, test_config())
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect_err("both candidates fault");

    match EwsError::find(&err) {
        Some(EwsError::SoapFault(fault)) => {
            assert_eq!(fault.response_code.as_deref(), Some("ErrorInternalServerError"))
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_url_skips_candidate_derivation() {
    let explicit = "https://ad.fabrikam.com/autodiscover/autodiscover.svc";
    let transport = MockTransport::new();
    transport.respond(explicit, 200, &ews_settings());

    let mut autodiscover = service(&transport, test_config());
    autodiscover.set_url(explicit).unwrap();
    autodiscover
        .get_user_settings("jane@contoso.com", &EWS_SETTINGS)
        .await
        .expect("explicit endpoint answers");
    assert_eq!(transport.urls(), vec![explicit]);
}

#[tokio::test]
async fn test_invalid_address_is_rejected() {
    let transport = MockTransport::new();
    let err = service(&transport, test_config())
        .get_user_settings("not-an-address", &EWS_SETTINGS)
        .await
        .expect_err("no domain");
    assert!(err.to_string().contains("not a valid SMTP address"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_exchange_service_adopts_discovered_url() {
    let transport = MockTransport::new();
    transport.respond(
        DOMAIN_SVC,
        200,
        &user_settings_response(&[("InternalEwsUrl", "https://mbx.contoso.local/EWS/Exchange.asmx")]),
    );

    let mut service = ExchangeService::with_transport(transport.clone(), test_config());
    service.set_credentials(ExchangeCredentials::basic("jane@contoso.com", "secret"));
    let url = service
        .autodiscover_url("jane@contoso.com")
        .await
        .expect("discovery succeeds");

    assert_eq!(url.to_string(), "https://mbx.contoso.local/EWS/Exchange.asmx");
    assert_eq!(service.url(), Some(&url));
}
