//! Model listing and loading commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, LoadRequest, LoadedModel, ModelsResponse};
use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Artifact")]
    name: String,
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "Loaded")]
    loaded: String,
}

fn mark(flag: bool) -> String {
    if flag {
        "✓".to_string()
    } else {
        String::new()
    }
}

pub async fn list_models(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ModelsResponse = client.get("api/v1/models").await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.models.is_empty() {
                print_warning("No model artifacts found");
                return Ok(());
            }

            let loaded_name = response.loaded.as_ref().map(|m| m.name.as_str());
            let rows: Vec<ModelRow> = response
                .models
                .iter()
                .map(|name| ModelRow {
                    name: name.clone(),
                    default: mark(response.default.as_deref() == Some(name.as_str())),
                    loaded: mark(loaded_name == Some(name.as_str())),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            match &response.loaded {
                Some(model) => print_loaded(model),
                None => print_warning("No model loaded, run `arisk models load <file>` first"),
            }
        }
    }

    Ok(())
}

pub async fn load_model(client: &ApiClient, filename: &str, format: OutputFormat) -> Result<()> {
    let request = LoadRequest {
        filename: filename.to_string(),
    };
    let model: LoadedModel = client.post("api/v1/models/load", &request).await?;

    match format {
        OutputFormat::Json => print_json(&model)?,
        OutputFormat::Table => {
            print_success(&format!("Model loaded: {}", model.name));
            print_loaded(&model);
        }
    }

    Ok(())
}

fn print_loaded(model: &LoadedModel) {
    print_info(&format!("Model family: {}", model.family));
    if model.scaler {
        print_info("Feature scaler loaded");
    } else {
        print_warning("No feature scaler found");
    }
    let short_version = model.version.get(..12).unwrap_or(&model.version);
    println!("Version: {}  Session: {}", short_version, model.session_id);
}
