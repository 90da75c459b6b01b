use async_trait::async_trait;
use tracing::debug;

use super::CompositionProvider;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::object::DomainObject;

/// Serves any object whose model carries a `composition` array.
///
/// Edits rewrite that array through the mutation capability and then persist
/// the parent, so they follow whatever persistence decoration is in force.
#[derive(Debug, Default)]
pub struct DefaultCompositionProvider;

impl DefaultCompositionProvider {
    async fn edit<F>(&self, parent: &DomainObject, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Identifier>) -> bool + Send,
    {
        let mutation = parent.require_mutation()?;
        let changed = mutation.mutate(
            |model| {
                let mut children = model.composition().unwrap_or_default();
                if !change(&mut children) {
                    return false;
                }
                model.set_composition(&children);
                true
            },
            None,
        )?;

        if !changed {
            return Ok(());
        }
        match parent.persistence() {
            Some(persistence) => {
                persistence.persist().await?;
            }
            None => {
                debug!(id = %parent.id(), "parent has no persistence; composition kept in memory");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CompositionProvider for DefaultCompositionProvider {
    fn applies_to(&self, parent: &DomainObject) -> bool {
        parent.with_model(|model| model.has_composition())
    }

    async fn load(&self, parent: &DomainObject) -> Result<Vec<Identifier>> {
        Ok(parent
            .with_model(|model| model.composition())
            .unwrap_or_default())
    }

    async fn add(&self, parent: &DomainObject, child: &Identifier) -> Result<()> {
        self.edit(parent, |children| {
            if children.contains(child) {
                return false;
            }
            children.push(child.clone());
            true
        })
        .await
    }

    async fn remove(&self, parent: &DomainObject, child: &Identifier) -> Result<()> {
        self.edit(parent, |children| {
            let before = children.len();
            children.retain(|existing| existing != child);
            children.len() != before
        })
        .await
    }
}
