//! Locates the EOS token id of a pretrained model.
//!
//! Tokenizer artifacts disagree about where the EOS token lives: byte-level
//! tokenizers name it in `tokenizer_config.json`, many chat models only
//! record the id in `generation_config.json` or `config.json`. Locations are
//! probed in that order and the first hit wins.

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use serde_json::Value;
use tokenizers::{FromPretrainedParameters, Tokenizer};

use crate::primitives::TokenId;

pub(crate) trait Locator {
    fn locate_eos_token_id(
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId>;
}

/// Locates the EOS id from the model's configuration artifacts on the
/// Hugging Face Hub.
pub(crate) struct HFLocator;

impl Locator for HFLocator {
    fn locate_eos_token_id(
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId> {
        CONFIG_LOCATIONS
            .iter()
            .find_map(|location| location.lookup(model, tokenizer, parameters))
    }
}

/// How the EOS token is spelled in a configuration document.
enum EosField {
    /// A token string, or an added-token object with a `content` field,
    /// resolved to an id through the tokenizer itself.
    Token,
    /// A plain numeric id.
    Id,
}

struct ConfigLocation {
    file: &'static str,
    field: &'static str,
    kind: EosField,
}

static CONFIG_LOCATIONS: [ConfigLocation; 3] = [
    ConfigLocation {
        file: "tokenizer_config.json",
        field: "eos_token",
        kind: EosField::Token,
    },
    ConfigLocation {
        file: "generation_config.json",
        field: "eos_token_id",
        kind: EosField::Id,
    },
    ConfigLocation {
        file: "config.json",
        field: "eos_token_id",
        kind: EosField::Id,
    },
];

impl ConfigLocation {
    fn lookup(
        &self,
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId> {
        let document = fetch_config(model, self.file, parameters)?;
        let field = document.get(self.field)?;
        match self.kind {
            EosField::Token => {
                let content = match field {
                    Value::String(token) => token.as_str(),
                    Value::Object(added_token) => added_token.get("content")?.as_str()?,
                    _ => return None,
                };
                tokenizer.token_to_id(content)
            }
            EosField::Id => {
                // Some models list several stop ids, the first one is EOS.
                match field {
                    Value::Array(ids) => ids.first()?.as_u64().map(|id| id as TokenId),
                    _ => field.as_u64().map(|id| id as TokenId),
                }
            }
        }
    }
}

fn fetch_config(
    model: &str,
    file: &str,
    parameters: &Option<FromPretrainedParameters>,
) -> Option<Value> {
    let api = ApiBuilder::new().with_progress(false).build().ok()?;
    let repo = match parameters {
        Some(parameters) => Repo::with_revision(
            model.to_string(),
            RepoType::Model,
            parameters.revision.clone(),
        ),
        None => Repo::new(model.to_string(), RepoType::Model),
    };
    let path = api.repo(repo).get(file).ok()?;
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}
