use anyhow::{Result, anyhow};
use hyper::{Method, StatusCode, Uri, header};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::autodiscover::dns::{SrvResolver, select_srv_host};
use crate::autodiscover::pox::{parse_pox_response, write_pox_request};
use crate::autodiscover::soap::{parse_get_user_settings_response, write_get_user_settings_request};
use crate::autodiscover::types::{
    AutodiscoverOutcome, GetUserSettingsResponse, RedirectionUrlValidator, UserSettingName,
    https_only_validator,
};
use crate::common::{HttpRequest, HttpResponse, HttpTransport};
use crate::config::ClientConfig;
use crate::credentials::ExchangeCredentials;
use crate::error::EwsError;
use crate::service::{default_transport, standard_headers};
use crate::soap::extract_fault;
use crate::version::ExchangeVersion;

const SOAP_PATH: &str = "/autodiscover/autodiscover.svc";
const POX_PATH: &str = "/autodiscover/autodiscover.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Soap,
    Pox,
}

impl Endpoint {
    fn for_uri(uri: &Uri) -> Self {
        if uri.path().to_ascii_lowercase().ends_with(".xml") {
            Endpoint::Pox
        } else {
            Endpoint::Soap
        }
    }
}

enum Resolution {
    Settings(GetUserSettingsResponse),
    RedirectAddress(String),
}

/// State shared by every attempt of one `get_user_settings` call.
struct Chain {
    visited: HashSet<String>,
    hops: u32,
    max_hops: u32,
    unauthorized: bool,
    last_error: Option<anyhow::Error>,
}

impl Chain {
    fn new(max_hops: u32) -> Self {
        Self {
            visited: HashSet::new(),
            hops: 0,
            max_hops,
            unauthorized: false,
            last_error: None,
        }
    }

    /// Count one redirection.
    fn hop(&mut self) -> Result<()> {
        self.hops += 1;
        if self.hops > self.max_hops {
            warn!(hops = self.hops, "Autodiscover redirection limit reached");
            return Err(EwsError::RedirectLimit.into());
        }
        Ok(())
    }

    /// False when this address was already sent to this URL.
    fn visit(&mut self, email: &str, uri: &Uri) -> bool {
        self.visited
            .insert(format!("{}|{}", email.to_ascii_lowercase(), uri))
    }

    fn fail(&mut self, err: anyhow::Error) {
        self.last_error = Some(err);
    }

    /// The error to report once every candidate failed: a remembered 401
    /// first, then the last candidate failure, then `fallback`.
    fn into_error(self, fallback: anyhow::Error) -> anyhow::Error {
        if self.unauthorized {
            return EwsError::Unauthorized.into();
        }
        self.last_error.unwrap_or(fallback)
    }
}

/// Locates EWS endpoints for a mailbox.
///
/// Tries the explicit URL when one is set; otherwise the two well-known
/// `autodiscover.svc` locations of the address's domain, the unauthenticated
/// HTTP redirect probe, then DNS SRV. Redirects are followed by hand and
/// every target must pass the redirection validator.
#[derive(Clone)]
pub struct AutodiscoverService {
    transport: Arc<dyn HttpTransport>,
    credentials: Option<ExchangeCredentials>,
    config: ClientConfig,
    validator: RedirectionUrlValidator,
    srv_resolver: Option<Arc<dyn SrvResolver>>,
    explicit_url: Option<Uri>,
}

impl AutodiscoverService {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = default_transport(&config)?;
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            credentials: None,
            config,
            validator: https_only_validator(),
            srv_resolver: None,
            explicit_url: None,
        }
    }

    pub fn set_credentials(&mut self, credentials: ExchangeCredentials) {
        self.credentials = Some(credentials);
    }

    /// Query this endpoint instead of deriving candidates from the address.
    pub fn set_url(&mut self, url: &str) -> Result<()> {
        self.explicit_url = Some(url.parse()?);
        Ok(())
    }

    pub fn set_redirection_url_validator<F>(&mut self, validator: F)
    where
        F: Fn(&Uri) -> bool + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
    }

    pub fn set_srv_resolver(&mut self, resolver: Arc<dyn SrvResolver>) {
        self.srv_resolver = Some(resolver);
    }

    /// Resolve `settings` for `email`, following address and URL redirections.
    pub async fn get_user_settings(
        &self,
        email: &str,
        settings: &[UserSettingName],
    ) -> Result<GetUserSettingsResponse> {
        let mut chain = Chain::new(self.config.max_redirections);
        let mut addresses = HashSet::new();
        let mut email = email.trim().to_string();

        loop {
            if !addresses.insert(email.to_ascii_lowercase()) {
                warn!(%email, "Autodiscover address redirection loop");
                return Err(EwsError::RedirectLimit.into());
            }
            match self.discover(&email, settings, &mut chain).await {
                Ok(Resolution::Settings(mut response)) => {
                    if response.email.is_empty() {
                        response.email = email;
                    }
                    return Ok(response);
                }
                Ok(Resolution::RedirectAddress(next)) => {
                    chain.hop()?;
                    info!(from = %email, to = %next, "Autodiscover redirected to another address");
                    email = next;
                }
                Err(err) if EwsError::find(&err).is_some_and(|e| matches!(e, EwsError::RedirectLimit)) => {
                    return Err(err);
                }
                Err(err) => return Err(chain.into_error(err)),
            }
        }
    }

    async fn discover(
        &self,
        email: &str,
        settings: &[UserSettingName],
        chain: &mut Chain,
    ) -> Result<Resolution> {
        if let Some(url) = &self.explicit_url {
            return match self.try_candidate(url.clone(), email, settings, chain).await? {
                Some(resolution) => Ok(resolution),
                None => Err(anyhow!("explicit Autodiscover URL failed")),
            };
        }

        let domain = domain_of(email)?;
        for url in [
            format!("https://{domain}{SOAP_PATH}"),
            format!("https://autodiscover.{domain}{SOAP_PATH}"),
        ] {
            if let Some(resolution) = self.try_candidate(url.parse()?, email, settings, chain).await? {
                return Ok(resolution);
            }
        }

        if let Some(host) = self.probe_http_redirect(domain).await {
            let url = format!("https://{host}{SOAP_PATH}").parse()?;
            if let Some(resolution) = self.try_candidate(url, email, settings, chain).await? {
                return Ok(resolution);
            }
        }

        if let Some(host) = self.lookup_srv(domain).await {
            let url = format!("https://{host}{SOAP_PATH}").parse()?;
            if let Some(resolution) = self.try_candidate(url, email, settings, chain).await? {
                return Ok(resolution);
            }
        }

        Err(anyhow!("no Autodiscover candidate succeeded for {domain}"))
    }

    /// Protocol for `url`; Exchange 2007 SP1 only speaks POX.
    fn endpoint_for(&self, url: Uri) -> Result<(Uri, Endpoint)> {
        let endpoint = Endpoint::for_uri(&url);
        if endpoint == Endpoint::Soap
            && self.config.requested_version == ExchangeVersion::Exchange2007Sp1
        {
            return Ok((with_path(&url, POX_PATH)?, Endpoint::Pox));
        }
        Ok((url, endpoint))
    }

    /// Query one endpoint, following HTTP and `RedirectUrl` redirections.
    ///
    /// `Ok(None)` means this candidate failed and the chain should move on;
    /// the failure is recorded in `chain`. Only the redirection limit is fatal.
    async fn try_candidate(
        &self,
        url: Uri,
        email: &str,
        settings: &[UserSettingName],
        chain: &mut Chain,
    ) -> Result<Option<Resolution>> {
        let (mut current, mut endpoint) = self.endpoint_for(url)?;

        loop {
            if !chain.visit(email, &current) {
                debug!(url = %current, "Autodiscover URL already tried");
                return Ok(None);
            }

            debug!(url = %current, ?endpoint, %email, "trying Autodiscover endpoint");
            let response = match self.post(&current, endpoint, email, settings).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(url = %current, error = %err, "Autodiscover request failed");
                    chain.fail(err);
                    return Ok(None);
                }
            };

            match response.status {
                StatusCode::UNAUTHORIZED => {
                    warn!(url = %current, "Autodiscover endpoint rejected the credentials");
                    chain.unauthorized = true;
                    return Ok(None);
                }
                _ if response.is_redirect() => {
                    let Some(next) = response.location() else {
                        chain.fail(anyhow!("redirect from {current} without a usable Location"));
                        return Ok(None);
                    };
                    chain.hop()?;
                    if !self.accept_redirect(&next, chain) {
                        return Ok(None);
                    }
                    info!(from = %current, to = %next, "following Autodiscover redirect");
                    (current, endpoint) = self.endpoint_for(next)?;
                }
                StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
                    if endpoint == Endpoint::Soap =>
                {
                    debug!(url = %current, status = %response.status, "SOAP Autodiscover unavailable, trying POX");
                    current = with_path(&current, POX_PATH)?;
                    endpoint = Endpoint::Pox;
                }
                status if status.is_success() => {
                    let outcome = match endpoint {
                        Endpoint::Soap => parse_get_user_settings_response(&response.body),
                        Endpoint::Pox => {
                            parse_pox_response(&response.body).and_then(|pox| pox.into_outcome())
                        }
                    };
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            warn!(url = %current, error = %err, "unusable Autodiscover response");
                            chain.fail(err);
                            return Ok(None);
                        }
                    };
                    match outcome {
                        AutodiscoverOutcome::Settings(settings) => {
                            info!(url = %current, %email, "Autodiscover settings resolved");
                            return Ok(Some(Resolution::Settings(settings)));
                        }
                        AutodiscoverOutcome::RedirectAddress(address) => {
                            return Ok(Some(Resolution::RedirectAddress(address)));
                        }
                        AutodiscoverOutcome::RedirectUrl(target) => {
                            chain.hop()?;
                            let next = match target.parse::<Uri>() {
                                Ok(next) => next,
                                Err(err) => {
                                    chain.fail(anyhow!("invalid RedirectUrl {target}: {err}"));
                                    return Ok(None);
                                }
                            };
                            if !self.accept_redirect(&next, chain) {
                                return Ok(None);
                            }
                            info!(from = %current, to = %next, "Autodiscover RedirectUrl");
                            (current, endpoint) = self.endpoint_for(next)?;
                        }
                        AutodiscoverOutcome::Error(error) => {
                            warn!(url = %current, code = %error.code, message = %error.message, "Autodiscover error");
                            chain.fail(EwsError::from(error).into());
                            return Ok(None);
                        }
                    }
                }
                status => {
                    let err = match extract_fault(&response.body) {
                        Some(fault) => {
                            warn!(url = %current, %status, code = %fault.code, "Autodiscover SOAP fault");
                            EwsError::from(fault)
                        }
                        None => {
                            warn!(url = %current, %status, "Autodiscover endpoint failed");
                            EwsError::HttpStatus {
                                status,
                                body: response.text(),
                            }
                        }
                    };
                    chain.fail(err.into());
                    return Ok(None);
                }
            }
        }
    }

    fn accept_redirect(&self, next: &Uri, chain: &mut Chain) -> bool {
        if (self.validator)(next) {
            return true;
        }
        warn!(url = %next, "redirection target rejected by validator");
        chain.fail(anyhow!("redirection to {next} was rejected"));
        false
    }

    async fn post(
        &self,
        url: &Uri,
        endpoint: Endpoint,
        email: &str,
        settings: &[UserSettingName],
    ) -> Result<HttpResponse> {
        let body = match endpoint {
            Endpoint::Soap => write_get_user_settings_request(
                url,
                email,
                settings,
                self.config.requested_version,
            )?,
            Endpoint::Pox => write_pox_request(email)?,
        };
        if self.config.trace_payloads {
            trace!(url = %url, payload = %String::from_utf8_lossy(&body), "Autodiscover request body");
        }

        let mut req = HttpRequest::post_xml(url.clone(), body);
        for (name, value) in standard_headers(&self.config, self.credentials.as_ref())?.iter() {
            req.headers.insert(name.clone(), value.clone());
        }
        let response = self.transport.execute(req).await?;
        if self.config.trace_payloads {
            trace!(url = %url, status = %response.status, payload = %response.text(), "Autodiscover response body");
        }
        Ok(response)
    }

    /// Unauthenticated GET against `http://autodiscover.{domain}`; a validated
    /// redirect names the host to try next.
    async fn probe_http_redirect(&self, domain: &str) -> Option<String> {
        let url: Uri = format!("http://autodiscover.{domain}{POX_PATH}").parse().ok()?;
        let mut req = HttpRequest::new(Method::GET, url.clone());
        if let Ok(agent) = header::HeaderValue::from_str(&self.config.user_agent) {
            req.headers.insert(header::USER_AGENT, agent);
        }

        debug!(%url, "probing Autodiscover HTTP redirect");
        let response = match self.transport.execute(req).await {
            Ok(response) => response,
            Err(err) => {
                debug!(%url, error = %err, "redirect probe failed");
                return None;
            }
        };
        if !response.is_redirect() {
            debug!(%url, status = %response.status, "redirect probe returned no redirect");
            return None;
        }
        let location = response.location()?;
        if !(self.validator)(&location) {
            warn!(%location, "redirect probe target rejected by validator");
            return None;
        }
        location.host().map(str::to_string)
    }

    async fn lookup_srv(&self, domain: &str) -> Option<String> {
        let resolver = self.srv_resolver.as_ref()?;
        let name = format!("_autodiscover._tcp.{domain}");
        match resolver.lookup_srv(&name).await {
            Ok(records) => {
                let host = select_srv_host(&records);
                debug!(%name, records = records.len(), host = ?host, "SRV lookup");
                host
            }
            Err(err) => {
                debug!(%name, error = %err, "SRV lookup failed");
                None
            }
        }
    }
}

fn domain_of(email: &str) -> Result<&str> {
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(domain),
        _ => Err(anyhow!("{email} is not a valid SMTP address")),
    }
}

fn with_path(uri: &Uri, path: &str) -> Result<Uri> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path.parse()?);
    Ok(Uri::from_parts(parts)?)
}
