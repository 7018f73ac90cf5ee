//! # Backend Selection
//!
//! Opens the configured storage strategy behind `Arc<dyn CatalogRepository>`.
//!
//! ```text
//! BackendConfig::Relational(DbConfig) ──► Database::new ──► RelationalCatalog
//! BackendConfig::KeyValue(KvConfig)
//!     store = DynamoDb                ──► DynamoTable × 3 ──► KeyValueCatalog
//!     store = Memory                  ──► MemoryTable × 3 ──► KeyValueCatalog
//! ```

use std::sync::Arc;

use tracing::info;

use crate::error::DbResult;
use crate::kv::{KeyValueCatalog, KvConfig, KvStore};
use crate::pool::{Database, DbConfig};
use crate::repository::CatalogRepository;

/// Which storage strategy to run.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Relational(DbConfig),
    KeyValue(KvConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Relational(_) => "relational",
            BackendConfig::KeyValue(_) => "kv",
        }
    }
}

/// Opens a catalog for `config`.
///
/// The relational strategy connects and (by default) migrates before
/// returning. The DynamoDB store checks that its three tables exist.
pub async fn open_catalog(config: BackendConfig) -> DbResult<Arc<dyn CatalogRepository>> {
    info!(backend = config.name(), "Opening catalog");

    let catalog: Arc<dyn CatalogRepository> = match config {
        BackendConfig::Relational(db_config) => {
            let db = Database::new(db_config).await?;
            Arc::new(db.catalog())
        }
        BackendConfig::KeyValue(kv_config) => {
            info!(store = kv_config.store.name(), "Key-value store");
            match kv_config.store {
                KvStore::DynamoDb => Arc::new(KeyValueCatalog::dynamodb(&kv_config).await?),
                KvStore::Memory => Arc::new(KeyValueCatalog::in_memory(&kv_config)),
            }
        }
    };

    Ok(catalog)
}

// =============================================================================
// Cross-Backend Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use catalog_core::{
        CategoryChange, CoreError, CreateCategoryRequest, CreateDepartmentRequest, CreateProductRequest,
        ErrorKind, Money, Pagination, Product, ProductChange, ProductFilter, ProductPredicate,
    };

    async fn backends() -> Vec<Arc<dyn CatalogRepository>> {
        vec![
            open_catalog(BackendConfig::Relational(DbConfig::in_memory()))
                .await
                .unwrap(),
            open_catalog(BackendConfig::KeyValue(KvConfig::new("test_")))
                .await
                .unwrap(),
        ]
    }

    struct Fixture {
        grocery: String,
        hardware: String,
        dairy: String,
        tools: String,
    }

    async fn groups(catalog: &Arc<dyn CatalogRepository>) -> Fixture {
        let department = |name: &str, slug: &str| CreateDepartmentRequest {
            name: name.into(),
            slug: slug.into(),
            ..Default::default()
        };
        let category = |name: &str, slug: &str| CreateCategoryRequest {
            name: name.into(),
            slug: slug.into(),
            ..Default::default()
        };

        Fixture {
            grocery: catalog.create_department(department("Grocery", "grocery")).await.unwrap().id,
            hardware: catalog.create_department(department("Hardware", "hardware")).await.unwrap().id,
            dairy: catalog.create_category(category("Dairy", "dairy")).await.unwrap().id,
            tools: catalog.create_category(category("Tools", "tools")).await.unwrap().id,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn request(
        fx: &Fixture,
        sku: &str,
        name: &str,
        brand: &str,
        cents: i64,
        stock: i64,
        on_sale: bool,
        hardware: bool,
    ) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            description: format!("{name} from {brand}"),
            sku: sku.into(),
            slug: sku.to_lowercase(),
            price: Money::from_cents(cents),
            department_id: if hardware { fx.hardware.clone() } else { fx.grocery.clone() },
            category_id: if hardware { fx.tools.clone() } else { fx.dairy.clone() },
            brand: brand.into(),
            stock,
            min_stock: 2,
            is_on_sale: on_sale,
            ..Default::default()
        }
    }

    /// Ten products; three mention "milk", one is soft-deleted afterwards.
    async fn dataset(catalog: &Arc<dyn CatalogRepository>) -> Vec<Product> {
        dataset_with_groups(catalog).await.1
    }

    async fn dataset_with_groups(catalog: &Arc<dyn CatalogRepository>) -> (Fixture, Vec<Product>) {
        let fx = groups(catalog).await;
        let rows = [
            ("MILK-1", "Whole Milk", "Farmland", 199, 10, false, false),
            ("MILK-2", "Skim MILK", "Farmland", 189, 0, true, false),
            ("CHOC-1", "Chocolate drink", "Milkyway", 250, 4, false, false),
            ("BRD-1", "Bread", "Baker", 300, 1, true, false),
            ("EGG-12", "Eggs 12 pack", "Farmland", 420, 30, false, false),
            ("HAM-1", "Hammer", "Forge", 1599, 3, false, true),
            ("SAW-1", "Saw 50%_off", "Forge", 2599, 0, true, true),
            ("NAIL-100", "Nails", "Forge", 499, 100, false, true),
            ("TAPE-1", "Tape", "Stick", 99, 7, true, true),
            ("GONE-1", "Discontinued milk", "Old", 100, 5, false, false),
        ];

        let mut products = Vec::new();
        for (sku, name, brand, cents, stock, sale, hw) in rows {
            let product = catalog
                .create_product(request(&fx, sku, name, brand, cents, stock, sale, hw))
                .await
                .unwrap();
            products.push(product);
        }

        let gone = products.pop().unwrap();
        catalog.delete_product(&gone.id).await.unwrap();
        (fx, products)
    }

    fn filters() -> Vec<ProductFilter> {
        let mut filters = vec![
            ProductFilter::default(),
            ProductFilter {
                search: Some("milk".into()),
                ..Default::default()
            },
            ProductFilter {
                search: Some("FORGE".into()),
                ..Default::default()
            },
            ProductFilter {
                search: Some("milk ".into()),
                ..Default::default()
            },
            ProductFilter {
                search: Some("50%_".into()),
                ..Default::default()
            },
            ProductFilter {
                in_stock: Some(true),
                ..Default::default()
            },
            ProductFilter {
                in_stock: Some(false),
                is_on_sale: Some(true),
                ..Default::default()
            },
            ProductFilter {
                min_price: Some(Money::from_cents(199)),
                max_price: Some(Money::from_cents(1599)),
                ..Default::default()
            },
            ProductFilter {
                brand: Some("Forge".into()),
                in_stock: Some(true),
                ..Default::default()
            },
            ProductFilter {
                min_rating: Some(0.0),
                search: Some("a".into()),
                ..Default::default()
            },
            ProductFilter {
                min_rating: Some(4.5),
                ..Default::default()
            },
        ];
        for (limit, offset) in [(Some(3), Some(0)), (Some(3), Some(3)), (Some(1000), Some(-5))] {
            filters.push(ProductFilter {
                limit,
                offset,
                ..Default::default()
            });
        }
        filters
    }

    /// [`filters`] plus the reference clauses, which need this catalog's ids.
    fn filters_for(fx: &Fixture) -> Vec<ProductFilter> {
        let mut filters = filters();
        for id in [&fx.dairy, &fx.tools] {
            filters.push(ProductFilter {
                category_id: Some(id.clone()),
                ..Default::default()
            });
        }
        for id in [&fx.grocery, &fx.hardware] {
            filters.push(ProductFilter {
                department_id: Some(id.clone()),
                ..Default::default()
            });
        }
        filters.push(ProductFilter {
            department_id: Some(fx.grocery.clone()),
            max_price: Some(Money::from_cents(250)),
            search: Some("milk".into()),
            ..Default::default()
        });
        filters.push(ProductFilter {
            category_id: Some(fx.tools.clone()),
            department_id: Some(fx.grocery.clone()),
            ..Default::default()
        });
        filters.push(ProductFilter {
            category_id: Some("no-such-category".into()),
            ..Default::default()
        });
        filters
    }

    fn skus(products: &[Product]) -> Vec<String> {
        products.iter().map(|p| p.sku.clone()).collect()
    }

    #[tokio::test]
    async fn test_backends_return_identical_results() {
        let catalogs = backends().await;
        let mut per_backend = Vec::new();
        for catalog in &catalogs {
            let (fx, _) = dataset_with_groups(catalog).await;
            per_backend.push(filters_for(&fx));
        }

        for (index, filter) in per_backend[0].iter().enumerate() {
            let mut results = Vec::new();
            for (catalog, filters) in catalogs.iter().zip(&per_backend) {
                let filter = &filters[index];
                let page = catalog
                    .list_products(&filter.to_predicate(), filter.pagination())
                    .await
                    .unwrap();
                results.push((skus(&page.products), page.total_count, page.limit, page.offset));
            }
            // ids differ per backend, so compare by sku in id order
            let (relational, kv) = (&results[0], &results[1]);
            assert_eq!(relational.1, kv.1, "total for {filter:?}");
            assert_eq!(relational.2, kv.2);
            assert_eq!(relational.3, kv.3);
            let mut r = relational.0.clone();
            let mut k = kv.0.clone();
            if filter.limit.is_none() {
                r.sort();
                k.sort();
                assert_eq!(r, k, "page for {filter:?}");
            } else {
                assert_eq!(r.len(), k.len(), "page size for {filter:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_listing_matches_reference_predicate() {
        for catalog in backends().await {
            let (fx, products) = dataset_with_groups(&catalog).await;

            for filter in filters_for(&fx) {
                let predicate = filter.to_predicate();
                let page = catalog
                    .list_products(&predicate, Pagination::new(Some(100), None))
                    .await
                    .unwrap();

                let mut expected: Vec<&Product> =
                    products.iter().filter(|p| predicate.matches(p)).collect();
                expected.sort_by(|a, b| a.id.cmp(&b.id));
                let expected: Vec<String> = expected.iter().map(|p| p.sku.clone()).collect();

                assert_eq!(skus(&page.products), expected, "filter {filter:?}");
                assert_eq!(page.total_count, expected.len() as i64);
            }
        }
    }

    #[tokio::test]
    async fn test_pages_partition_the_result() {
        for catalog in backends().await {
            dataset(&catalog).await;
            let predicate = ProductPredicate::active_only();

            let full = catalog
                .list_products(&predicate, Pagination::new(Some(100), None))
                .await
                .unwrap();
            assert_eq!(full.total_count, 9);

            let mut stitched = Vec::new();
            for offset in (0..12).step_by(4) {
                let page = catalog
                    .list_products(&predicate, Pagination::new(Some(4), Some(offset)))
                    .await
                    .unwrap();
                assert_eq!(page.total_count, 9);
                stitched.extend(page.products);
            }
            assert_eq!(stitched, full.products);
        }
    }

    #[tokio::test]
    async fn test_search_milk_second_page_of_one() {
        for catalog in backends().await {
            dataset(&catalog).await;
            let filter = ProductFilter {
                search: Some("milk".into()),
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            };

            let all = catalog
                .list_products(&filter.to_predicate(), Pagination::new(Some(100), None))
                .await
                .unwrap();
            let page = catalog
                .list_products(&filter.to_predicate(), filter.pagination())
                .await
                .unwrap();

            assert_eq!(page.total_count, 3);
            assert_eq!(page.products.len(), 1);
            assert_eq!(page.products[0], all.products[1]);
            assert_eq!((page.limit, page.offset), (1, 1));
        }
    }

    #[tokio::test]
    async fn test_soft_deleted_records_disappear() {
        for catalog in backends().await {
            let products = dataset(&catalog).await;
            let target = &products[0];
            catalog.delete_product(&target.id).await.unwrap();

            let page = catalog
                .list_products(&ProductPredicate::active_only(), Pagination::new(Some(100), None))
                .await
                .unwrap();
            assert!(page.products.iter().all(|p| p.id != target.id));
            assert_eq!(
                catalog.get_product(&target.id).await.unwrap_err().kind(),
                ErrorKind::NotFound
            );
            assert_eq!(
                catalog.adjust_stock(&target.id, 1).await.unwrap_err().kind(),
                ErrorKind::NotFound
            );
        }
    }

    #[tokio::test]
    async fn test_stock_scenario() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            let mut req = request(&fx, "MILK-9", "Milk", "Farm", 199, 10, false, false);
            req.min_stock = 5;
            let product = catalog.create_product(req).await.unwrap();

            let err = catalog.adjust_stock(&product.id, -12).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
            assert_eq!(catalog.get_product(&product.id).await.unwrap().stock, 10);

            let after = catalog.adjust_stock(&product.id, -10).await.unwrap();
            assert_eq!(after.stock, 0);

            let low = catalog.list_low_stock().await.unwrap();
            assert!(low.iter().any(|p| p.id == product.id));
        }
    }

    #[tokio::test]
    async fn test_reference_filters_select_by_group() {
        for catalog in backends().await {
            let (fx, _) = dataset_with_groups(&catalog).await;
            let count = |filter: ProductFilter| {
                let catalog = Arc::clone(&catalog);
                async move {
                    catalog
                        .list_products(&filter.to_predicate(), filter.pagination())
                        .await
                        .unwrap()
                        .total_count
                }
            };

            let hardware = ProductFilter {
                department_id: Some(fx.hardware.clone()),
                ..Default::default()
            };
            assert_eq!(count(hardware).await, 4);

            let dairy = ProductFilter {
                category_id: Some(fx.dairy.clone()),
                ..Default::default()
            };
            assert_eq!(count(dairy).await, 5);

            // Whole Milk (199) and Skim MILK (189); the chocolate drink is 250
            // but only its brand mentions milk, and it still qualifies.
            let combined = ProductFilter {
                department_id: Some(fx.grocery.clone()),
                max_price: Some(Money::from_cents(250)),
                search: Some("milk".into()),
                ..Default::default()
            };
            assert_eq!(count(combined).await, 3);
        }
    }

    #[tokio::test]
    async fn test_search_folds_unicode_case() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            let product = catalog
                .create_product(request(&fx, "APF-1", "ÄPFEL Bio", "Hof", 299, 5, false, false))
                .await
                .unwrap();
            catalog
                .create_product(request(&fx, "BIR-1", "Birnen", "Hof", 199, 5, false, false))
                .await
                .unwrap();

            for needle in ["äpfel", "ÄPFEL", "Äpfel bio"] {
                let filter = ProductFilter {
                    search: Some(needle.into()),
                    ..Default::default()
                };
                let page = catalog
                    .list_products(&filter.to_predicate(), filter.pagination())
                    .await
                    .unwrap();
                assert_eq!(page.total_count, 1, "needle {needle}");
                assert_eq!(page.products[0].id, product.id);
            }

            // search text follows a rename
            catalog
                .update_product(&product.id, vec![ProductChange::Name("Öl extra".into())])
                .await
                .unwrap();
            let filter = ProductFilter {
                search: Some("öl".into()),
                ..Default::default()
            };
            let page = catalog
                .list_products(&filter.to_predicate(), filter.pagination())
                .await
                .unwrap();
            assert_eq!(page.total_count, 1);
        }
    }

    #[tokio::test]
    async fn test_overflowing_adjustment_rejected_alike() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            let product = catalog
                .create_product(request(&fx, "BIG-1", "Bulk item", "Any", 100, 10, false, false))
                .await
                .unwrap();

            let err = catalog.adjust_stock(&product.id, i64::MAX).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{err}");

            // the row is untouched and still readable
            assert_eq!(catalog.get_product(&product.id).await.unwrap().stock, 10);
            let page = catalog
                .list_products(&ProductPredicate::active_only(), Pagination::default())
                .await
                .unwrap();
            assert_eq!(page.total_count, 1);

            let err = catalog.adjust_stock(&product.id, i64::MIN).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);

            let full = catalog.adjust_stock(&product.id, i64::MAX - 10).await.unwrap();
            assert_eq!(full.stock, i64::MAX);
            let err = catalog.adjust_stock(&product.id, 1).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(catalog.get_product(&product.id).await.unwrap().stock, i64::MAX);
        }
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_overdraw() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            let product = catalog
                .create_product(request(&fx, "HOT-1", "Hot item", "Any", 100, 10, false, false))
                .await
                .unwrap();

            let mut handles = Vec::new();
            for _ in 0..8 {
                let catalog = Arc::clone(&catalog);
                let id = product.id.clone();
                handles.push(tokio::spawn(async move { catalog.adjust_stock(&id, -3).await }));
            }

            let mut succeeded = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => succeeded += 1,
                    Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
                }
            }

            assert_eq!(succeeded, 3);
            assert_eq!(catalog.get_product(&product.id).await.unwrap().stock, 1);
        }
    }

    #[tokio::test]
    async fn test_uniqueness_conflicts() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            catalog
                .create_product(request(&fx, "DUP-1", "One", "B", 100, 1, false, false))
                .await
                .unwrap();

            let mut same_sku = request(&fx, "DUP-1", "Two", "B", 100, 1, false, false);
            same_sku.slug = "another".into();
            let err = catalog.create_product(same_sku).await.unwrap_err();
            assert!(
                matches!(
                    &err,
                    DbError::Domain(CoreError::Duplicate { field, value })
                        if field == "sku" && value == "DUP-1"
                ),
                "{err:?}"
            );

            let mut same_slug = request(&fx, "DUP-2", "Three", "B", 100, 1, false, false);
            same_slug.slug = "dup-1".into();
            let err = catalog.create_product(same_slug).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);

            let err = catalog
                .create_department(CreateDepartmentRequest {
                    name: "Again".into(),
                    slug: "grocery".into(),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
    }

    #[tokio::test]
    async fn test_category_reparent_cascades_levels() {
        for catalog in backends().await {
            let create = |name: &str, parent: Option<&str>| CreateCategoryRequest {
                name: name.into(),
                slug: name.to_lowercase(),
                parent_id: parent.map(str::to_string),
                ..Default::default()
            };

            let food = catalog.create_category(create("Food", None)).await.unwrap();
            let bakery = catalog.create_category(create("Bakery", Some(&food.id))).await.unwrap();
            let dairy = catalog.create_category(create("Dairy", Some(&food.id))).await.unwrap();
            let milk = catalog.create_category(create("Milk", Some(&dairy.id))).await.unwrap();
            assert_eq!(milk.level, 2);

            let moved = catalog
                .update_category(&dairy.id, vec![CategoryChange::Parent(Some(bakery.id.clone()))])
                .await
                .unwrap();
            assert_eq!(moved.level, 2);
            assert_eq!(moved.parent_id.as_deref(), Some(bakery.id.as_str()));
            assert_eq!(catalog.get_category(&milk.id).await.unwrap().level, 3);

            for category in catalog.list_categories(None).await.unwrap() {
                let expected = match &category.parent_id {
                    None => 0,
                    Some(parent) => catalog.get_category(parent).await.unwrap().level + 1,
                };
                assert_eq!(category.level, expected, "{}", category.name);
            }

            let err = catalog
                .update_category(&food.id, vec![CategoryChange::Parent(Some(milk.id.clone()))])
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
    }

    #[tokio::test]
    async fn test_empty_patch_is_rejected() {
        for catalog in backends().await {
            let fx = groups(&catalog).await;
            let err = catalog.update_category(&fx.dairy, Vec::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);

            let err = catalog.update_category("missing", Vec::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }
}
