//! The CalDAV transport collaborator.
//!
//! Thin I/O glue around [`libdav`]: discovers the calendar, fetches the
//! raw VTODO resources and pushes saves/deletes. Errors are reported as
//! strings; the model layer converts them to boolean outcomes.

use crate::model::TaskRecord;

use libdav::caldav::{FindCalendarHomeSet, FindCalendars, GetCalendarResources};
use libdav::dav::{Delete, GetProperty, ListResources, PutResource};
use libdav::dav::{WebDavClient, WebDavError};
use libdav::{CalDavClient, names};

use http::{StatusCode, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use tower_http::auth::AddAuthorization;

type HttpsClient = AddAuthorization<
    Client<
        hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
        String,
    >,
>;

/// One fetched VTODO resource: the wire body plus its server coordinates.
#[derive(Clone, Debug)]
pub struct RawTodo {
    pub data: String,
    pub etag: String,
    pub href: String,
}

#[derive(Clone, Debug)]
pub struct DavTransport {
    client: CalDavClient<HttpsClient>,
}

impl DavTransport {
    pub fn new(url: &str, user: &str, pass: &str, insecure: bool) -> Result<Self, String> {
        if url.is_empty() {
            return Err("no server URL configured".to_string());
        }

        let uri: Uri = url
            .parse()
            .map_err(|e: http::uri::InvalidUri| e.to_string())?;

        let https_connector = if insecure {
            let tls_config = rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth();

            HttpsConnectorBuilder::new()
                .with_tls_config(tls_config)
                .https_or_http()
                .enable_http1()
                .build()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            root_store.add_parsable_certificates(result.certs);

            if root_store.is_empty() {
                return Err("No valid system certificates found.".to_string());
            }

            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();

            HttpsConnectorBuilder::new()
                .with_tls_config(tls_config)
                .https_or_http()
                .enable_http1()
                .build()
        };

        let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
        let auth_client = AddAuthorization::basic(http_client, user, pass);
        let webdav = WebDavClient::new(uri, auth_client);

        Ok(Self {
            client: CalDavClient::new(webdav),
        })
    }

    /// Resolve a calendar by display name or href via principal
    /// discovery.
    pub async fn find_calendar(&self, name: &str) -> Result<String, String> {
        let principal = self
            .client
            .find_current_user_principal()
            .await
            .map_err(|e| format!("{:?}", e))?
            .ok_or("No principal")?;

        let home_set_resp = self
            .client
            .request(FindCalendarHomeSet::new(principal.path()))
            .await
            .map_err(|e| format!("{:?}", e))?;
        let home_url = home_set_resp.home_sets.first().ok_or("No home set")?;

        let cals_resp = self
            .client
            .request(FindCalendars::new(home_url.path()))
            .await
            .map_err(|e| format!("{:?}", e))?;

        for col in cals_resp.calendars {
            if col.href == name {
                return Ok(col.href);
            }
            let display = self
                .client
                .request(GetProperty::new(&col.href, &names::DISPLAY_NAME))
                .await
                .ok()
                .and_then(|r| r.value);
            if display.as_deref() == Some(name) {
                return Ok(col.href);
            }
        }
        Err(format!("calendar {:?} not found", name))
    }

    /// Pick a calendar without a configured name: the base path itself
    /// when it already holds .ics resources, otherwise the first
    /// discovered calendar, otherwise the base path.
    pub async fn discover_calendar(&self) -> Result<String, String> {
        let base_path = self.client.base_url().path().to_string();

        if let Ok(response) = self.client.request(ListResources::new(&base_path)).await
            && response.resources.iter().any(|r| r.href.ends_with(".ics"))
        {
            return Ok(base_path);
        }

        if let Ok(Some(principal)) = self.client.find_current_user_principal().await
            && let Ok(response) = self
                .client
                .request(FindCalendarHomeSet::new(principal.path()))
                .await
            && let Some(home_url) = response.home_sets.first()
            && let Ok(cals_resp) = self
                .client
                .request(FindCalendars::new(home_url.path()))
                .await
            && let Some(first) = cals_resp.calendars.first()
        {
            return Ok(first.href.clone());
        }
        Ok(base_path)
    }

    /// List the calendar and multiget every .ics resource in it.
    pub async fn fetch_raw(&self, calendar_href: &str) -> Result<Vec<RawTodo>, String> {
        let list_resp = self
            .client
            .request(ListResources::new(calendar_href))
            .await
            .map_err(|e| format!("PROPFIND: {:?}", e))?;

        let hrefs: Vec<String> = list_resp
            .resources
            .into_iter()
            .filter(|r| r.href.ends_with(".ics"))
            .map(|r| r.href)
            .collect();
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let fetched_resp = self
            .client
            .request(GetCalendarResources::new(calendar_href).with_hrefs(hrefs))
            .await
            .map_err(|e| format!("MULTIGET: {:?}", e))?;

        let mut out = Vec::new();
        for item in fetched_resp.resources {
            match item.content {
                Ok(content) => out.push(RawTodo {
                    data: content.data,
                    etag: content.etag,
                    href: item.href,
                }),
                Err(e) => log::warn!("skipping resource {}: {:?}", item.href, e),
            }
        }
        Ok(out)
    }

    /// PUT the record: a create when it has no etag yet, a conditional
    /// update otherwise. Assigns the href for records saved the first
    /// time and adopts the etag the server returns with the response.
    pub async fn put_task(&self, task: &mut TaskRecord) -> Result<(), String> {
        if task.href.is_empty() {
            let filename = format!("{}.ics", task.get_uid());
            task.href = if task.calendar_href.ends_with('/') {
                format!("{}{}", task.calendar_href, filename)
            } else {
                format!("{}/{}", task.calendar_href, filename)
            };
        }
        let ics_string = task.to_ics();

        let response = if task.etag.is_empty() {
            self.client
                .request(PutResource::new(&task.href).create(ics_string, "text/calendar"))
                .await
                .map_err(|e| format!("{:?}", e))?
        } else {
            self.client
                .request(PutResource::new(&task.href).update(
                    ics_string,
                    "text/calendar; charset=utf-8; component=VTODO",
                    &task.etag,
                ))
                .await
                .map_err(|e| format!("{:?}", e))?
        };
        if let Some(etag) = response.etag {
            task.etag = etag;
        }
        Ok(())
    }

    /// DELETE the record on the server. A 404 counts as success; the
    /// resource is gone either way.
    pub async fn delete_task(&self, task: &TaskRecord) -> Result<(), String> {
        let result = if task.etag.is_empty() {
            self.client.request(Delete::new(&task.href).force()).await
        } else {
            self.client
                .request(Delete::new(&task.href).with_etag(&task.etag))
                .await
        };
        match result {
            Ok(_) => Ok(()),
            Err(WebDavError::BadStatusCode(StatusCode::NOT_FOUND)) => Ok(()),
            Err(e) => Err(format!("{:?}", e)),
        }
    }
}

#[derive(Debug)]
struct NoVerifier;
impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _: &rustls::pki_types::CertificateDer<'_>,
        _: &[rustls::pki_types::CertificateDer<'_>],
        _: &rustls::pki_types::ServerName<'_>,
        _: &[u8],
        _: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }
    fn verify_tls12_signature(
        &self,
        _: &[u8],
        _: &rustls::pki_types::CertificateDer<'_>,
        _: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }
    fn verify_tls13_signature(
        &self,
        _: &[u8],
        _: &rustls::pki_types::CertificateDer<'_>,
        _: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }
    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        use rustls::SignatureScheme::*;
        vec![
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
            RSA_PKCS1_SHA512,
            ECDSA_NISTP256_SHA256,
            RSA_PSS_SHA256,
            ED25519,
        ]
    }
}
