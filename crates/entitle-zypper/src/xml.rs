use entitle_core::{Error, InstalledService, LocalRepository, Product, ProductPackage, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ProductStream {
    #[serde(rename = "product-list", default)]
    product_list: ProductList,
}

#[derive(Debug, Default, Deserialize)]
struct ProductList {
    #[serde(rename = "product", default)]
    products: Vec<XmlProduct>,
}

#[derive(Debug, Deserialize)]
struct XmlProduct {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@version", default)]
    version: String,
    #[serde(rename = "@arch", default)]
    arch: String,
    #[serde(rename = "@release", default)]
    release: String,
    #[serde(rename = "@summary", default)]
    summary: String,
    #[serde(rename = "@isbase", default)]
    is_base: String,
    #[serde(rename = "@registerrelease", default)]
    release_type: String,
    #[serde(rename = "@productline", default)]
    product_line: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceStream {
    #[serde(rename = "service-list", default)]
    service_list: ServiceList,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceList {
    #[serde(rename = "service", default)]
    services: Vec<XmlService>,
}

#[derive(Debug, Deserialize)]
struct XmlService {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@url", default)]
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct RepoStream {
    #[serde(rename = "repo-list", default)]
    repo_list: RepoList,
}

#[derive(Debug, Default, Deserialize)]
struct RepoList {
    #[serde(rename = "repo", default)]
    repos: Vec<XmlRepo>,
}

#[derive(Debug, Deserialize)]
struct XmlRepo {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@alias", default)]
    alias: String,
    #[serde(rename = "@enabled", default)]
    enabled: String,
    #[serde(rename = "@priority", default)]
    priority: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchStream {
    #[serde(rename = "search-result", default)]
    search_result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(rename = "solvable-list", default)]
    solvable_list: SolvableList,
}

#[derive(Debug, Default, Deserialize)]
struct SolvableList {
    #[serde(rename = "solvable", default)]
    solvables: Vec<XmlSolvable>,
}

#[derive(Debug, Deserialize)]
struct XmlSolvable {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@edition", default)]
    edition: String,
    #[serde(rename = "@arch", default)]
    arch: String,
    #[serde(rename = "@repository", default)]
    repository: String,
}

fn parse_stream<T: DeserializeOwned + Default>(raw: &[u8]) -> Result<T> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    quick_xml::de::from_str(&text).map_err(|err| Error::Xml(err.to_string()))
}

fn flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

pub fn parse_products(raw: &[u8]) -> Result<Vec<Product>> {
    let stream: ProductStream = parse_stream(raw)?;
    Ok(stream
        .product_list
        .products
        .into_iter()
        .map(|product| Product {
            name: product.name,
            version: product.version,
            arch: product.arch,
            release: product.release,
            summary: product.summary,
            is_base: flag(&product.is_base),
            release_type: product.release_type,
            product_line: product.product_line,
            description: product.description.unwrap_or_default().trim().to_string(),
            available: true,
            ..Product::default()
        })
        .collect())
}

pub fn parse_services(raw: &[u8]) -> Result<Vec<InstalledService>> {
    let stream: ServiceStream = parse_stream(raw)?;
    Ok(stream
        .service_list
        .services
        .into_iter()
        .map(|service| InstalledService {
            name: service.name,
            url: service.url,
        })
        .collect())
}

pub fn parse_repositories(raw: &[u8]) -> Result<Vec<LocalRepository>> {
    let stream: RepoStream = parse_stream(raw)?;
    Ok(stream
        .repo_list
        .repos
        .into_iter()
        .map(|repo| LocalRepository {
            name: repo.name,
            alias: repo.alias,
            url: repo.url.unwrap_or_default().trim().to_string(),
            enabled: flag(&repo.enabled),
            priority: repo.priority.trim().parse().unwrap_or(0),
        })
        .collect())
}

pub fn parse_search_results(raw: &[u8]) -> Result<Vec<ProductPackage>> {
    let stream: SearchStream = parse_stream(raw)?;
    Ok(stream
        .search_result
        .solvable_list
        .solvables
        .into_iter()
        .map(|solvable| ProductPackage {
            name: solvable.name,
            edition: solvable.edition,
            arch: solvable.arch,
            repository: solvable.repository,
        })
        .collect())
}
