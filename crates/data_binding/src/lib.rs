//! Data binding for template expansion
//!
//! This crate provides:
//! - Bound values and their enumeration shape
//! - The data context: data stack, index/key cursor and named items
//! - Binding behaviours and the enumerator family driven by templates
//! - Binding paths (`a.b[0]`, `$index`, `$key`, `@item`)
//! - Inline, JSON and CSV data sources

pub mod behaviour;
pub mod context;
pub mod data_source;
pub mod enumerator;
pub mod error;
pub mod path;
pub mod stack;
pub mod value;

pub use behaviour::DataBindingBehaviour;
pub use context::{ConformanceMode, CursorSnapshot, DataContext, ItemCollection};
pub use data_source::{
    CsvDataSource, DataOrigin, DataSource, DataSourceCollection, InlineDataSource, JsonDataSource,
};
pub use enumerator::{BindingEnumerator, BoundItem, EnumeratorKind};
pub use error::{BindingError, Result};
pub use path::{BindingPath, PathSegment};
pub use stack::{DataFrame, DataStack};
pub use value::{BindingValue, ValueShape};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::rc::Rc;

    proptest! {
        #[test]
        fn drive_visits_every_item_and_restores_cursor(
            items in prop::collection::vec(any::<i32>(), 0..20),
            start_index in 0usize..100,
            fail_at in prop::option::of(0usize..20),
        ) {
            let mut ctx = DataContext::default();
            ctx.set_current_index(start_index);
            ctx.set_current_key(Some("outer".into()));

            let len = items.len();
            let value = Rc::new(BindingValue::from(items));
            let behaviour = DataBindingBehaviour::REPEATING;

            let result = BindingEnumerator::select(Some(value), behaviour)
                .unwrap()
                .drive(&mut ctx, behaviour, None, |c, ordinal| {
                    prop_assert_eq!(c.current_index(), ordinal);
                    prop_assert_eq!(c.data_stack().depth(), 1);
                    if Some(ordinal) == fail_at {
                        return Err(TestCaseError::fail("stop"));
                    }
                    Ok(())
                });

            match fail_at.filter(|at| *at < len) {
                Some(_) => prop_assert!(result.is_err()),
                None => prop_assert_eq!(result.unwrap(), len),
            }
            prop_assert_eq!(ctx.current_index(), start_index);
            prop_assert_eq!(ctx.current_key(), Some("outer"));
            prop_assert!(!ctx.data_stack().has_data());
        }
    }
}
