//! Image (Glance) client.

use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::rest::RestClient;

/// Image service client.
#[derive(Debug, Clone)]
pub struct ImageApi {
    rest: RestClient,
}

impl ImageApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn list_images(&self) -> Result<Vec<Image>, ApiError> {
        let resp: ImagesResponse = self.rest.get("/v2/images").await?;
        Ok(resp.images)
    }

    pub async fn get_image(&self, id: &str) -> Result<Image, ApiError> {
        self.rest.get(&format!("/v2/images/{id}")).await
    }

    /// Register an image record (payload upload is a separate call the
    /// harness does not need).
    pub async fn create_image(
        &self,
        name: &str,
        disk_format: &str,
        container_format: &str,
    ) -> Result<Image, ApiError> {
        let body = json!({
            "name": name,
            "disk_format": disk_format,
            "container_format": container_format,
        });
        self.rest.post("/v2/images", &body).await
    }

    pub async fn delete_image(&self, id: &str) -> Result<(), ApiError> {
        self.rest.delete(&format!("/v2/images/{id}")).await
    }

    /// First image whose name starts with `prefix` (the lab's stock
    /// boot image is found this way).
    pub async fn find_by_name_prefix(&self, prefix: &str) -> Result<Option<Image>, ApiError> {
        let images = self.list_images().await?;
        Ok(images
            .into_iter()
            .find(|i| i.name.as_deref().is_some_and(|n| n.starts_with(prefix))))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    images: Vec<Image>,
}
