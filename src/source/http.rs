//! Transport-backed Source. Thin mapping from the Source operations onto
//! blocking HTTP calls; connection handling and retries belong to the HTTP
//! client, not here. Transport errors propagate unwrapped.

use crate::error::{Error, Result};
use crate::resource::ResourceInstance;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::Value;

use super::{body_root, RequestContext, Source};

pub struct HttpSource {
    base_url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Self {
        HttpSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn apply_headers(&self, req: RequestBuilder, ctx: &RequestContext) -> RequestBuilder {
        ctx.headers()
            .iter()
            .fold(req, |req, (name, value)| req.header(name, value))
    }
}

impl Source for HttpSource {
    fn get(&self, ctx: &RequestContext, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(url = %url, ?query, "http get");
        let req = self.client.get(&url).query(query);
        let resp = self.apply_headers(req, ctx).send()?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::DocumentNotFound);
        }
        let text = resp.error_for_status()?.text()?;
        body_root(Some(&text))
    }

    fn post(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<Value> {
        let url = self.url(&instance.collection_location());
        tracing::debug!(url = %url, "http post");
        let req = self.client.post(&url).json(&instance.to_hash());
        let text = self
            .apply_headers(req, ctx)
            .send()?
            .error_for_status()?
            .text()?;
        body_root(Some(&text))
    }

    fn put(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool> {
        let url = self.url(&instance.location());
        tracing::debug!(url = %url, "http put");
        let req = self.client.put(&url).json(&instance.to_hash());
        self.apply_headers(req, ctx).send()?.error_for_status()?;
        Ok(true)
    }

    fn delete(&self, ctx: &RequestContext, instance: &ResourceInstance) -> Result<bool> {
        let url = self.url(&instance.location());
        tracing::debug!(url = %url, "http delete");
        let req = self.client.delete(&url);
        self.apply_headers(req, ctx).send()?.error_for_status()?;
        Ok(true)
    }

    fn put_sub_resource(
        &self,
        ctx: &RequestContext,
        owner: &ResourceInstance,
        relation: &str,
        ids: &[String],
    ) -> Result<bool> {
        let url = self.url(&format!("{}/{}", owner.location(), relation));
        tracing::debug!(url = %url, count = ids.len(), "http put_sub_resource");
        let req = self.client.put(&url).json(&ids);
        self.apply_headers(req, ctx).send()?.error_for_status()?;
        Ok(true)
    }
}
