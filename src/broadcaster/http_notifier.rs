//! Reference Notifier: POSTs the payload to a webhook URL.
//!
//! Grounded on `original_source/notification/http/http.go`'s parameter
//! contract (`url`, `method`), adapted to a blocking `reqwest` client per
//! the other example repos' use of `reqwest` for simple outbound HTTP.
use reqwest::blocking::Client;

use crate::broadcaster::notifier;
use crate::broadcaster::notifier::Notifier;
use crate::errors::ErrorKind;
use crate::scheduler::Parameters;
use crate::Result;
use crate::ResultExt;

const NOTIFIER_KIND: &str = "http";

/// Registers the `http` notifier type with the global factory.
pub fn register() {
    notifier::register(NOTIFIER_KIND, |id, params| {
        Ok(Box::new(HttpNotifier::from_parameters(id, params)?) as Box<dyn Notifier>)
    });
}

pub struct HttpNotifier {
    id: String,
    url: String,
    method: reqwest::Method,
    client: Client,
}

impl HttpNotifier {
    fn from_parameters(id: String, mut params: Parameters) -> Result<HttpNotifier> {
        let url = take_string(&mut params, "url")?;
        let method = take_string(&mut params, "method")?;
        let method = method
            .parse::<reqwest::Method>()
            .map_err(|_| ErrorKind::InvalidNotifierParameters(format!("invalid HTTP method '{}'", method)))?;
        if !params.is_empty() {
            let unknown: Vec<String> = params.keys().cloned().collect();
            return Err(ErrorKind::InvalidNotifierParameters(format!(
                "unknown keys: {}",
                unknown.join(", ")
            ))
            .into());
        }
        Ok(HttpNotifier {
            id,
            url,
            method,
            client: Client::new(),
        })
    }
}

fn take_string(params: &mut Parameters, key: &str) -> Result<String> {
    let value = params
        .remove(key)
        .ok_or_else(|| ErrorKind::InvalidNotifierParameters(format!("missing required key '{}'", key)))?;
    serde_yaml::from_value(value)
        .chain_err(|| ErrorKind::InvalidNotifierParameters(format!("'{}' must be a string", key)))
}

impl Notifier for HttpNotifier {
    fn id(&self) -> &str {
        &self.id
    }

    fn notify(&self, payload: &[u8]) -> Result<()> {
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .body(payload.to_vec())
            .send()
            .chain_err(|| format!("http notifier '{}' request failed", self.id))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!(
                "http notifier '{}' received status {}",
                self.id,
                response.status()
            )
            .into())
        }
    }
}
