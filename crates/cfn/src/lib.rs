use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as Json};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const IAM_ROLE_TYPE: &str = "AWS::IAM::Role";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CfnAnyResource {
    #[serde(rename="Type")]
    pub type_name: String,
    #[serde(rename="Properties", default)]
    pub properties: JsonMap<String, Json>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CfnTemplate {
    #[serde(rename="AWSTemplateFormatVersion", default)] pub version: Option<String>,
    #[serde(rename="Description", default)] pub description: Option<String>,
    #[serde(rename="Resources", default)] pub resources: BTreeMap<String, CfnAnyResource>,
}

/// One inline policy of an `AWS::IAM::Role`, as `{ PolicyName, PolicyDocument }`.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    pub role: String,
    pub name: String,
    pub document: Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub role: String,
    pub policy: String,
    pub asterisk_free: bool,
}

pub fn parse_template(text: &str) -> Result<CfnTemplate> {
    serde_json::from_str(text).context("parse CloudFormation template (JSON)")
}

/// Plain YAML only; short-form intrinsics like `!Ref` fail to parse.
pub fn parse_template_yaml(text: &str) -> Result<CfnTemplate> {
    serde_yaml::from_str(text).context("parse CloudFormation template (YAML)")
}

pub fn load_template(path: &Path) -> Result<CfnTemplate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read template {}", path.display()))?;
    let yaml = matches!(path.extension().and_then(|s| s.to_str()), Some("yaml" | "yml"));
    let tpl = if yaml { parse_template_yaml(&text) } else { parse_template(&text) };
    tpl.with_context(|| format!("load template {}", path.display()))
}

/// Inline policies of every `AWS::IAM::Role`, ordered by logical id.
pub fn role_policies(tpl: &CfnTemplate) -> Result<Vec<RolePolicy>> {
    let mut out = Vec::new();
    for (role, res) in tpl.resources.iter().filter(|(_, r)| r.type_name == IAM_ROLE_TYPE) {
        let policies = match res.properties.get("Policies") {
            None => continue,
            Some(Json::Array(items)) => items,
            Some(_) => anyhow::bail!("role '{}': Policies must be an array", role),
        };
        for (ix, p) in policies.iter().enumerate() {
            let name = p.get("PolicyName").and_then(Json::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", ix));
            out.push(RolePolicy { role: role.clone(), name, document: p.clone() });
        }
    }
    Ok(out)
}

pub fn scan_template(tpl: &CfnTemplate) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for p in role_policies(tpl)? {
        let asterisk_free = wildcheck_policy::is_document_asterisk_free(&p.document)
            .with_context(|| format!("role '{}' policy '{}'", p.role, p.name))?;
        debug!(role = %p.role, policy = %p.name, asterisk_free, "scanned role policy");
        findings.push(Finding { role: p.role, policy: p.name, asterisk_free });
    }
    Ok(findings)
}
