use crate::{Error, Product, Result};

/// Deepest extension nesting accepted from the registration server.
pub const MAX_TREE_DEPTH: usize = 32;

/// `visit` returns whether to descend into the product's own extensions.
/// The root itself is not visited.
pub fn traverse<F>(root: &Product, mut visit: F) -> Result<()>
where
    F: FnMut(&Product) -> Result<bool>,
{
    walk(root, &root.to_triplet(), 1, &mut visit)
}

fn walk<F>(node: &Product, root: &str, depth: usize, visit: &mut F) -> Result<()>
where
    F: FnMut(&Product) -> Result<bool>,
{
    if node.extensions.is_empty() {
        return Ok(());
    }
    if depth > MAX_TREE_DEPTH {
        return Err(Error::TreeTooDeep {
            root: root.to_string(),
            limit: MAX_TREE_DEPTH,
        });
    }

    for extension in &node.extensions {
        if visit(extension)? {
            walk(extension, root, depth + 1, visit)?;
        }
    }
    Ok(())
}

pub fn flatten(root: &Product) -> Result<Vec<Product>> {
    let mut flat = Vec::new();
    traverse(root, |extension| {
        flat.push(extension.clone());
        Ok(true)
    })?;
    Ok(flat)
}
