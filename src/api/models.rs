use crate::api::{GeminiModelsResponse, ModelInfo, ModelsResponse};
use crate::core::providers::Provider;
use crate::utils::url::{append_query, construct_api_url};

/// List the models a provider offers for `secret`, sorted for display.
///
/// Gemini entries are normalized into [`ModelInfo`] with the `models/`
/// prefix stripped from their names.
pub async fn fetch_models(
    client: &reqwest::Client,
    provider: Provider,
    secret: &str,
    base_url: &str,
) -> Result<Vec<ModelInfo>, Box<dyn std::error::Error>> {
    let models_url = construct_api_url(base_url, "models");
    let mut request = match provider {
        Provider::Gemini => client.get(append_query(&models_url, "key", secret)),
        _ => client.get(models_url),
    };
    for (name, value) in provider.auth_headers(secret) {
        request = request.header(name, value);
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(format!(
            "{} API error ({}): {error_text}",
            provider.display_name(),
            status.as_u16()
        )
        .into());
    }

    let mut models = match provider {
        Provider::Gemini => response
            .json::<GeminiModelsResponse>()
            .await?
            .models
            .into_iter()
            .map(|model| ModelInfo {
                id: model
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&model.name)
                    .to_string(),
                created: None,
                created_at: None,
                owned_by: None,
                display_name: model.display_name,
            })
            .collect(),
        _ => response.json::<ModelsResponse>().await?.data,
    };
    sort_models(&mut models);
    Ok(models)
}

/// Newest first when creation dates are known, then by id.
pub fn sort_models(models: &mut [ModelInfo]) {
    models.sort_by(|a, b| {
        // OpenAI-style listings carry `created`, Anthropic carries `created_at`
        match (&a.created, &b.created, &a.created_at, &b.created_at) {
            (Some(a_created), Some(b_created), _, _) => b_created.cmp(a_created),
            (Some(_), None, _, _) => std::cmp::Ordering::Less,
            (None, Some(_), _, _) => std::cmp::Ordering::Greater,
            (None, None, Some(a_created_at), Some(b_created_at)) => {
                b_created_at.cmp(a_created_at)
            }
            (None, None, Some(_), None) => std::cmp::Ordering::Less,
            (None, None, None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None, None, None) => a.id.cmp(&b.id),
        }
    });
}
