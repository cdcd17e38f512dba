use crate::api::chat::FileUpload;
use crate::api::client::ApiClient;
use crate::api::models::{Category, Ingredient, Page, Product};
use crate::config::Session;
use crate::error::{ApiError, Result};
use reqwest::multipart::{Form, Part};

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryForm {
    pub name: String,
    /// CSS colour of the category tile, e.g. `#FFB020`.
    pub bg_color: String,
    pub image: Option<FileUpload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductForm {
    pub name: String,
    pub category_id: String,
    pub description: String,
    pub price: f64,
    pub ingredients: Vec<Ingredient>,
    pub image: Option<FileUpload>,
}

impl CategoryForm {
    fn into_form(self) -> Result<Form> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Category name is required"));
        }
        if self.bg_color.trim().is_empty() {
            return Err(ApiError::validation("Please choose a background color"));
        }
        let form = Form::new()
            .text("name", self.name.trim().to_string())
            .text("bgColor", self.bg_color.trim().to_string());
        attach_image(form, self.image)
    }
}

impl ProductForm {
    fn into_form(self) -> Result<Form> {
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Product name is required"));
        }
        if self.category_id.is_empty() {
            return Err(ApiError::validation("Pick a category"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ApiError::validation("Price must be a positive number"));
        }
        let ingredients = self.ingredients_json()?;
        let form = Form::new()
            .text("name", self.name.trim().to_string())
            .text("category", self.category_id)
            .text("description", self.description)
            .text("price", self.price.to_string())
            .text("ingredients", ingredients);
        attach_image(form, self.image)
    }

    /// Named ingredients as the JSON array string the backend parses.
    fn ingredients_json(&self) -> Result<String> {
        let named: Vec<&Ingredient> = self
            .ingredients
            .iter()
            .filter(|i| !i.name.trim().is_empty())
            .collect();
        Ok(serde_json::to_string(&named)?)
    }
}

fn attach_image(form: Form, image: Option<FileUpload>) -> Result<Form> {
    match image {
        Some(file) => {
            let part = Part::bytes(file.bytes).file_name(file.file_name).mime_str(&file.mime)?;
            Ok(form.part("image", part))
        }
        None => Ok(form),
    }
}

/// Categories and menu items (`/categories`, `/items`).
#[derive(Clone)]
pub struct CatalogApi {
    client: ApiClient,
    session: Session,
}

impl CatalogApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        let req = self.client.get("/categories", &self.session);
        self.client.send(req, &self.session).await
    }

    pub async fn create_category(&self, form: CategoryForm) -> Result<String> {
        let req = self.client.post("/categories", &self.session).multipart(form.into_form()?);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn update_category(&self, id: &str, form: CategoryForm) -> Result<String> {
        let req = self
            .client
            .put(&format!("/categories/{id}"), &self.session)
            .multipart(form.into_form()?);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<String> {
        let req = self.client.delete(&format!("/categories/{id}"), &self.session);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn products(&self, page: u32, limit: u32) -> Result<Page<Product>> {
        let req = self
            .client
            .get("/items", &self.session)
            .query(&[("page", page), ("limit", limit)]);
        self.client.send_page(req, &self.session).await
    }

    pub async fn create_product(&self, form: ProductForm) -> Result<String> {
        let req = self.client.post("/items", &self.session).multipart(form.into_form()?);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn update_product(&self, id: &str, form: ProductForm) -> Result<String> {
        let req = self
            .client
            .put(&format!("/items/{id}"), &self.session)
            .multipart(form.into_form()?);
        self.client.send_ack(req, &self.session).await
    }

    pub async fn delete_product(&self, id: &str) -> Result<String> {
        let req = self.client.delete(&format!("/items/{id}"), &self.session);
        self.client.send_ack(req, &self.session).await
    }
}
