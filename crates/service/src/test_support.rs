//! In-memory fakes for the repository traits, shared by service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use model::{Category, Product, User};
use repository::{
    CategoriesRepository, NewUser, ProductFilter, ProductsRepository, RepositoryError,
    UsersRepository,
};

/// A catalog product with sensible defaults for tests.
pub fn product(id: i64, price: i64, stock: Option<i32>) -> Product {
    Product {
        id,
        name: format!("Sản phẩm {id}"),
        slug: format!("san-pham-{id}"),
        description: format!("Mô tả sản phẩm {id}"),
        specification: String::new(),
        colors: vec!["Đen".into()],
        price,
        flash_price: None,
        flash_starts_at: None,
        flash_ends_at: None,
        stock,
        is_active: true,
        category_id: Some(1),
        image_url: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

/// In-memory `ProductsRepository`.
pub struct FakeProducts {
    by_id: HashMap<i64, Product>,
}

impl FakeProducts {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            by_id: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

#[async_trait]
impl ProductsRepository for FakeProducts {
    async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let needle = filter.query.as_deref().unwrap_or("").to_lowercase();
        let mut out: Vec<Product> = self
            .by_id
            .values()
            .filter(|p| p.is_active)
            .filter(|p| {
                needle.is_empty()
                    || p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
                    || (filter.match_specification
                        && p.specification.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        out.truncate(filter.limit.max(0) as usize);
        Ok(out)
    }

    async fn flash_items(
        &self,
        now: chrono::DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut out: Vec<Product> = self
            .by_id
            .values()
            .filter(|p| p.is_active && crate::pricing::is_flash_active(p, now))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.flash_ends_at);
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn get(&self, id: i64) -> Result<Product, RepositoryError> {
        self.by_id.get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Product>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect())
    }

    async fn related(
        &self,
        category_id: i64,
        exclude_id: i64,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut out: Vec<Product> = self
            .by_id
            .values()
            .filter(|p| {
                p.is_active && p.category_id == Some(category_id) && p.id != exclude_id
            })
            .cloned()
            .collect();
        out.sort_by_key(|p| p.id);
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }
}

/// In-memory `CategoriesRepository`.
pub struct FakeCategories {
    categories: Vec<Category>,
}

impl FakeCategories {
    pub fn new(names: &[&str]) -> Self {
        Self {
            categories: names
                .iter()
                .enumerate()
                .map(|(i, name)| Category {
                    id: i as i64 + 1,
                    name: (*name).to_string(),
                    slug: name.to_lowercase().replace(' ', "-"),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CategoriesRepository for FakeCategories {
    async fn all(&self) -> Result<Vec<Category>, RepositoryError> {
        Ok(self.categories.clone())
    }
}

/// In-memory `UsersRepository`.
#[derive(Default)]
pub struct FakeUsers {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UsersRepository for FakeUsers {
    async fn insert(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        let stored = User {
            id: users.len() as i64 + 1,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: Utc::now(),
        };
        users.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }
}
