use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use crate::error::{ApsError, ApsResult};

/// Máximo de issues por requisição; não há paginação
pub const ISSUE_LIMIT: usize = 200;

/// Hub (conta) acessível pelo token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Projeto dentro de um hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl Project {
    /// ID do container de issues: escopo `b360project.<id>` quando presente
    pub fn container_id(&self) -> String {
        self.scopes
            .iter()
            .find_map(|scope| scope.strip_prefix("b360project."))
            .map(str::to_string)
            .unwrap_or_else(|| container_id_for(&self.id))
    }
}

/// Mapeamento permissivo de projeto para container: remove o prefixo `b.`
pub fn container_id_for(project_id: &str) -> String {
    project_id.strip_prefix("b.").unwrap_or(project_id).to_string()
}

/// Tipo de issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueType {
    pub id: String,
    pub title: String,
    #[serde(rename = "isActive", default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Issue em formato plano: `id` mais todos os campos devolvidos pelo provedor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Issue {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Normaliza um item da resposta (plano ou JSON:API com `attributes`)
    pub fn from_json(value: Value) -> ApsResult<Self> {
        let Value::Object(mut object) = value else {
            return Err(ApsError::parse_error("issue não é um objeto JSON"));
        };

        if let Some(Value::Object(attributes)) = object.remove("attributes") {
            for key in ["type", "links", "relationships"] {
                object.remove(key);
            }
            for (key, value) in attributes {
                if key != "id" {
                    object.insert(key, value);
                }
            }
        }

        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(ApsError::parse_error("issue sem campo id")),
        };

        Ok(Self {
            id,
            fields: object.into_iter().collect(),
        })
    }

    /// Campo pelo nome (inclui `id`)
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(name).cloned()
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    pub fn issue_type_id(&self) -> Option<&str> {
        self.str_field("issueTypeId")
    }

    /// Nomes de todos os campos presentes, incluindo `id`
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once("id").chain(self.fields.keys().map(String::as_str))
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Filtros opcionais de listagem; vazio significa sem restrição
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFilters {
    #[serde(default)]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl IssueFilters {
    pub fn new(issue_type: Option<String>, status: Option<String>) -> Self {
        Self { issue_type, status }
    }

    fn active(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        Self::active(&self.issue_type).is_none() && Self::active(&self.status).is_none()
    }

    /// Parâmetros de query enviados ao provedor
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(issue_type) = Self::active(&self.issue_type) {
            pairs.push(("filter[issueTypeId]", issue_type.to_string()));
        }
        if let Some(status) = Self::active(&self.status) {
            pairs.push(("filter[status]", status.to_string()));
        }
        pairs
    }

    /// Verdadeiro se a issue satisfaz todos os filtros não vazios
    pub fn matches(&self, issue: &Issue) -> bool {
        let type_ok = Self::active(&self.issue_type)
            .map_or(true, |wanted| issue.issue_type_id() == Some(wanted));
        let status_ok = Self::active(&self.status)
            .map_or(true, |wanted| issue.status() == Some(wanted));
        type_ok && status_ok
    }
}

// Formas cruas da API de Data Management (JSON:API)

#[derive(Debug, Deserialize)]
pub(crate) struct JsonApiList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonApiItem<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HubData {
    pub id: String,
    #[serde(default)]
    pub attributes: HubAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HubAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub extension: Option<Extension>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Extension {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl From<HubData> for Hub {
    fn from(raw: HubData) -> Self {
        Self {
            name: raw.attributes.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            region: raw.attributes.region,
            kind: raw.attributes.extension.and_then(|e| e.kind),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectData {
    pub id: String,
    #[serde(default)]
    pub attributes: ProjectAttributes,
    #[serde(default)]
    pub relationships: Option<ProjectRelationships>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProjectAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProjectRelationships {
    #[serde(default)]
    pub hub: Option<JsonApiItem<Reference>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reference {
    pub id: String,
}

impl From<ProjectData> for Project {
    fn from(raw: ProjectData) -> Self {
        Self {
            name: raw.attributes.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            hub_id: raw
                .relationships
                .and_then(|r| r.hub)
                .and_then(|h| h.data)
                .map(|reference| reference.id),
            scopes: raw.attributes.scopes,
        }
    }
}
