//! Default cancellation/debounce identity derivation.

use crate::request::RequestDescriptor;

/// Derives the default identity: method + URL + sorted query + the JSON
/// serialization of the body.
///
/// Query pairs are sorted so interceptor- or caller-ordering differences do
/// not split otherwise identical requests into distinct identities.
pub(crate) fn default_identity(request: &RequestDescriptor) -> String {
    let mut identity = format!("{} {}", request.method, request.url);

    if !request.query.is_empty() {
        let mut query = request.query.clone();
        query.sort();
        identity.push('?');
        for (i, (name, value)) in query.iter().enumerate() {
            if i > 0 {
                identity.push('&');
            }
            identity.push_str(name);
            identity.push('=');
            identity.push_str(value);
        }
    }

    if let Some(body) = &request.body {
        identity.push('|');
        identity.push_str(&body.to_string());
    }

    identity
}
