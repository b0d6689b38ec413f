//! Device Commands
//!
//! Bindings for `/api/device`: app and site block lists, device
//! registration, blocking, and agent package downloads.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{parse_list, segment, ApiClient, Area};
use crate::error::{Error, Result};
use crate::models::Device;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppListArgs<'a> {
    child_id: &'a str,
    app_list: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteListArgs<'a> {
    child_id: &'a str,
    site_list: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddDeviceArgs<'a> {
    child_id: &'a str,
    name: &'a str,
    device_id: &'a str,
    device_password: &'a str,
}

/// Installable agent bundles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPackage {
    Service,
    Ui,
    Installer,
}

impl AgentPackage {
    fn path(self) -> &'static str {
        match self {
            AgentPackage::Service => "download_agent",
            AgentPackage::Ui => "download_agent_ui",
            AgentPackage::Installer => "download_agentInstaller",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            AgentPackage::Service => "FamilyBlockService.zip",
            AgentPackage::Ui => "FamilyBlockUI.zip",
            AgentPackage::Installer => "FamilyBlockInstaller.zip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn disposition_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"filename\*?=(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#).ok())
        .as_ref()
}

/// File name from a `Content-Disposition` header value
pub(crate) fn attachment_file_name(header: &str) -> Option<String> {
    let captures = disposition_regex()?.captures(header)?;
    let raw = (1..=3).find_map(|i| captures.get(i))?.as_str().trim();
    // RFC 5987 form: UTF-8''percent-encoded-name
    let name = match raw.split_once("''") {
        Some((_, encoded)) => percent_decode_str(encoded).decode_utf8_lossy().into_owned(),
        None => raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
    };
    (!name.is_empty()).then_some(name)
}

impl ApiClient {
    /// Raw app list as reported by the child's agent
    pub async fn child_apps(&self, child_id: &str) -> Result<Value> {
        let path = format!("get_apps/{}", segment(child_id));
        self.get(Area::Device, &path, &[]).await
    }

    /// Replace the blocked app list (process names)
    pub async fn update_child_apps(&self, child_id: &str, process_names: &[String]) -> Result<()> {
        let args = AppListArgs {
            child_id,
            app_list: process_names,
        };
        self.call(Method::POST, Area::Device, "update_apps", &[], Some(&args))
            .await
            .map(|_| ())
    }

    pub async fn child_sites(&self, child_id: &str) -> Result<Value> {
        let path = format!("get_sites/{}", segment(child_id));
        self.get(Area::Device, &path, &[]).await
    }

    pub async fn update_child_sites(&self, child_id: &str, sites: &[String]) -> Result<()> {
        let args = SiteListArgs {
            child_id,
            site_list: sites,
        };
        self.call(Method::POST, Area::Device, "update_sites", &[], Some(&args))
            .await
            .map(|_| ())
    }

    pub async fn is_running(&self, child_id: &str) -> Result<Value> {
        let path = format!("get_is_running/{}", segment(child_id));
        self.get(Area::Device, &path, &[]).await
    }

    pub async fn block_device(&self, child_id: &str) -> Result<()> {
        let path = format!("block_device/{}", segment(child_id));
        let empty = serde_json::Map::new();
        self.call(Method::POST, Area::Device, &path, &[], Some(&empty))
            .await
            .map(|_| ())
    }

    pub async fn unblock_device(&self, child_id: &str) -> Result<()> {
        let path = format!("unblock_device/{}", segment(child_id));
        let empty = serde_json::Map::new();
        self.call(Method::POST, Area::Device, &path, &[], Some(&empty))
            .await
            .map(|_| ())
    }

    pub async fn add_device(&self, child_id: &str, name: &str, device_id: &str, password: &str) -> Result<()> {
        if name.trim().is_empty() || device_id.trim().is_empty() {
            return Err(Error::Validation("device name and id are required".into()));
        }
        let args = AddDeviceArgs {
            child_id,
            name: name.trim(),
            device_id: device_id.trim(),
            device_password: password,
        };
        self.call(Method::POST, Area::Device, "add_device", &[], Some(&args))
            .await
            .map(|_| ())
    }

    pub async fn devices(&self, child_id: &str) -> Result<Vec<Device>> {
        let path = format!("get_devices/{}", segment(child_id));
        let body = self.get(Area::Device, &path, &[]).await?;
        Ok(parse_list(body, "res"))
    }

    pub async fn delete_device(&self, child_id: &str, device_id: &str) -> Result<()> {
        let path = format!("delete_device/{}/{}", segment(child_id), segment(device_id));
        self.call(Method::DELETE, Area::Device, &path, &[], None::<&()>)
            .await
            .map(|_| ())
    }

    /// Fetch an agent bundle; the name comes from `Content-Disposition`
    pub async fn download_agent(&self, package: AgentPackage) -> Result<AgentDownload> {
        let response = self
            .execute(Method::GET, Area::Device, package.path(), &[], None::<&()>)
            .await?;
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| package.default_file_name().to_string());
        let bytes = response.bytes().await?;
        Ok(AgentDownload {
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_file_name_forms() {
        assert_eq!(
            attachment_file_name(r#"attachment; filename="Agent v2.zip""#).as_deref(),
            Some("Agent v2.zip")
        );
        assert_eq!(
            attachment_file_name("attachment; filename=agent.zip; size=10").as_deref(),
            Some("agent.zip")
        );
        assert_eq!(
            attachment_file_name("attachment; filename*=UTF-8''Family%20Block.zip").as_deref(),
            Some("Family Block.zip")
        );
        assert_eq!(attachment_file_name("inline"), None);
    }
}
