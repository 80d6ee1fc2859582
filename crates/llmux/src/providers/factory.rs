use reqwest::Client;

use super::{
    anthropic::AnthropicAdapter,
    base::{Adapter, Provider, ProviderKind},
    google::GoogleAdapter,
    openai::OpenAiAdapter,
    xai::XaiAdapter,
};
use crate::errors::LlmResult;

/// Pick the wire adapter for a provider. The client is shared, never rebuilt per call.
pub fn get_adapter(provider: &Provider, client: Client) -> LlmResult<Box<dyn Adapter>> {
    let adapter: Box<dyn Adapter> = match provider.kind()? {
        ProviderKind::OpenAi => Box::new(OpenAiAdapter::new(client, provider)),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter::new(client, provider)),
        ProviderKind::Google => Box::new(GoogleAdapter::new(client, provider)),
        ProviderKind::Xai => Box::new(XaiAdapter::new(client, provider)),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_kind_has_an_adapter() {
        for kind in ProviderKind::iter() {
            let provider = Provider::new(kind.as_str(), "key");
            let adapter = get_adapter(&provider, Client::new()).unwrap();
            assert_eq!(adapter.kind(), kind);
        }
    }

    #[test]
    fn test_unknown_provider() {
        let err = get_adapter(&Provider::new("cohere", "key"), Client::new()).err().unwrap();
        assert_eq!(err.field(), Some("provider"));
    }
}
