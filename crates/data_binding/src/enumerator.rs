//! Enumeration strategies that turn a bound value into template items
//!
//! The strategy is picked once per bound value from its [`ValueShape`] and the
//! template's [`DataBindingBehaviour`]. Dispatch precedence follows the shape
//! order: text, map, structured object, sequence, then any other scalar.

use crate::{BindingError, BindingValue, DataBindingBehaviour, DataContext, Result, ValueShape};
use serde_json::map::IntoIter as JsonFields;
use std::collections::btree_map::IntoIter as MapEntries;
use std::rc::Rc;
use std::vec::IntoIter as SequenceItems;

/// One item produced by an enumerator
#[derive(Debug, Clone, PartialEq)]
pub struct BoundItem {
    /// The item value, `None` when nothing was bound
    pub value: Option<Rc<BindingValue>>,
    /// The entry key for map, object and expanded sequence items
    pub key: Option<String>,
}

/// Which strategy an enumerator is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumeratorKind {
    Single,
    Dictionary,
    ObjectProperty,
    Collection,
}

/// A closed set of enumeration strategies over a bound value
#[derive(Debug)]
pub enum BindingEnumerator {
    /// Exactly one item: the value itself
    Single(Option<BoundItem>),
    /// Key/value entries of a map
    Dictionary(MapEntries<String, BindingValue>),
    /// Fields of a structured object
    ObjectProperty(JsonFields),
    /// Items of a sequence, optionally keyed by position
    Collection {
        items: SequenceItems<BindingValue>,
        position: usize,
        keyed: bool,
    },
}

impl BindingEnumerator {
    /// Wrap a value as a one-item sequence
    pub fn single(value: Option<Rc<BindingValue>>) -> Self {
        BindingEnumerator::Single(Some(BoundItem { value, key: None }))
    }

    /// Pick the strategy for a value under the given behaviour.
    ///
    /// Expanding a text value or a scalar has no implementation and fails
    /// with [`BindingError::NotImplemented`].
    pub fn select(value: Option<Rc<BindingValue>>, behaviour: DataBindingBehaviour) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::single(None));
        };

        if !behaviour.enumerate_through_data() {
            return Ok(Self::single(Some(value)));
        }

        let expand = behaviour.expand_object_properties();
        match value.shape() {
            ValueShape::Empty => Ok(Self::single(Some(value))),
            ValueShape::Text if expand => Err(BindingError::NotImplemented(
                "expanding the properties of a text value".to_string(),
            )),
            ValueShape::Text => Ok(Self::single(Some(value))),
            ValueShape::Map if expand => match Rc::unwrap_or_clone(value) {
                BindingValue::Map(map) => Ok(BindingEnumerator::Dictionary(map.into_iter())),
                other => Ok(Self::single(Some(Rc::new(other)))),
            },
            ValueShape::Map => Ok(Self::single(Some(value))),
            ValueShape::Structured if expand => match Rc::unwrap_or_clone(value) {
                BindingValue::Object(fields) => Ok(BindingEnumerator::ObjectProperty(fields.into_iter())),
                other => Ok(Self::single(Some(Rc::new(other)))),
            },
            ValueShape::Structured => Ok(Self::single(Some(value))),
            ValueShape::Sequence => match Rc::unwrap_or_clone(value) {
                BindingValue::Sequence(items) => Ok(BindingEnumerator::Collection {
                    items: items.into_iter(),
                    position: 0,
                    keyed: expand,
                }),
                other => Ok(Self::single(Some(Rc::new(other)))),
            },
            ValueShape::Scalar if expand => Err(BindingError::NotImplemented(format!(
                "expanding the properties of the scalar value '{}'",
                value
            ))),
            ValueShape::Scalar => Ok(Self::single(Some(value))),
        }
    }

    pub fn kind(&self) -> EnumeratorKind {
        match self {
            BindingEnumerator::Single(_) => EnumeratorKind::Single,
            BindingEnumerator::Dictionary(_) => EnumeratorKind::Dictionary,
            BindingEnumerator::ObjectProperty(_) => EnumeratorKind::ObjectProperty,
            BindingEnumerator::Collection { .. } => EnumeratorKind::Collection,
        }
    }

    /// Walk every item, exposing it to `visit` through the context.
    ///
    /// Each item is pushed onto the data stack when the behaviour sets context
    /// data, and the zero-based ordinal becomes the current index when the
    /// behaviour increments it. The stack depth and the index/key cursor are
    /// put back after every item and when `visit` fails. Returns the number
    /// of items visited.
    pub fn drive<E, F>(
        self,
        context: &mut DataContext,
        behaviour: DataBindingBehaviour,
        source: Option<&str>,
        mut visit: F,
    ) -> std::result::Result<usize, E>
    where
        F: FnMut(&mut DataContext, usize) -> std::result::Result<(), E>,
    {
        context.scoped(|context| {
            let mut count = 0;

            for item in self {
                if behaviour.increment_context_index() {
                    context.set_current_index(count);
                }
                if item.key.is_some() {
                    context.set_current_key(item.key);
                }

                let depth = context.data_stack().depth();
                if behaviour.set_context_data() {
                    if let Some(value) = item.value {
                        context
                            .data_stack_mut()
                            .push(value, source.map(str::to_string));
                    }
                }

                let outcome = visit(context, count);
                context.data_stack_mut().truncate(depth);
                outcome?;

                count += 1;
            }

            if count == 0 {
                tracing::debug!("enumerator produced no items");
            }
            Ok(count)
        })
    }
}

impl Iterator for BindingEnumerator {
    type Item = BoundItem;

    fn next(&mut self) -> Option<BoundItem> {
        match self {
            BindingEnumerator::Single(item) => item.take(),
            BindingEnumerator::Dictionary(entries) => entries.next().map(|(key, value)| BoundItem {
                value: Some(Rc::new(value)),
                key: Some(key),
            }),
            BindingEnumerator::ObjectProperty(fields) => fields.next().map(|(key, value)| BoundItem {
                value: Some(Rc::new(BindingValue::from(value))),
                key: Some(key),
            }),
            BindingEnumerator::Collection {
                items,
                position,
                keyed,
            } => {
                let value = items.next()?;
                let key = keyed.then(|| position.to_string());
                *position += 1;
                Some(BoundItem {
                    value: Some(Rc::new(value)),
                    key,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn rc(value: impl Into<BindingValue>) -> Option<Rc<BindingValue>> {
        Some(Rc::new(value.into()))
    }

    #[test]
    fn test_select_dispatch() {
        let repeat = DataBindingBehaviour::REPEATING;
        let expand = DataBindingBehaviour::EXPANDING;

        let kind = |value, behaviour| BindingEnumerator::select(value, behaviour).unwrap().kind();

        assert_eq!(kind(None, repeat), EnumeratorKind::Single);
        assert_eq!(kind(rc("abc"), repeat), EnumeratorKind::Single);
        assert_eq!(kind(rc(vec![1, 2, 3]), repeat), EnumeratorKind::Collection);
        assert_eq!(kind(rc(vec![1, 2, 3]), expand), EnumeratorKind::Collection);
        assert_eq!(kind(rc(json!({"a": 1})), repeat), EnumeratorKind::Single);
        assert_eq!(kind(rc(json!({"a": 1})), expand), EnumeratorKind::ObjectProperty);
        assert_eq!(kind(rc(BTreeMap::<String, BindingValue>::new()), expand), EnumeratorKind::Dictionary);
        assert_eq!(kind(rc(5), repeat), EnumeratorKind::Single);
        assert_eq!(kind(rc(vec![1]), DataBindingBehaviour::SINGLE), EnumeratorKind::Single);
    }

    #[test]
    fn test_expand_text_or_scalar_fails() {
        let expand = DataBindingBehaviour::EXPANDING;
        assert!(matches!(
            BindingEnumerator::select(rc("abc"), expand),
            Err(BindingError::NotImplemented(_))
        ));
        assert!(matches!(
            BindingEnumerator::select(rc(true), expand),
            Err(BindingError::NotImplemented(_))
        ));
        assert!(BindingEnumerator::select(None, expand).is_ok());
    }

    #[test]
    fn test_object_fields_are_keyed() {
        let items: Vec<BoundItem> =
            BindingEnumerator::select(rc(json!({"north": 10, "south": 20})), DataBindingBehaviour::EXPANDING)
                .unwrap()
                .collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key.as_deref(), Some("north"));
        assert_eq!(items[1].value.as_deref(), Some(&BindingValue::Number(20.0)));
    }

    #[test]
    fn test_drive_pushes_and_counts() {
        let mut ctx = DataContext::default();
        ctx.set_current_index(7);
        let mut seen = Vec::new();

        let count = BindingEnumerator::select(rc(vec!["a", "b", "c"]), DataBindingBehaviour::REPEATING)
            .unwrap()
            .drive::<(), _>(&mut ctx, DataBindingBehaviour::REPEATING, Some("src"), |c, ordinal| {
                let current = c.data_stack().current().map(|v| v.to_display_string());
                seen.push((ordinal, c.current_index(), current, c.data_stack().source().map(str::to_string)));
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(seen[2], (2, 2, Some("c".to_string()), Some("src".to_string())));
        assert_eq!(ctx.current_index(), 7);
        assert!(!ctx.data_stack().has_data());
    }

    #[test]
    fn test_drive_empty_stack_runs_once() {
        let mut ctx = DataContext::default();
        let count = BindingEnumerator::select(None, DataBindingBehaviour::REPEATING)
            .unwrap()
            .drive::<(), _>(&mut ctx, DataBindingBehaviour::REPEATING, None, |c, _| {
                assert!(!c.data_stack().has_data());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_drive_restores_on_error() {
        let mut ctx = DataContext::default();
        ctx.data_stack_mut().push(BindingValue::from("outer"), None);
        ctx.set_current_key(Some("k".into()));

        let result = BindingEnumerator::select(rc(json!({"a": 1, "b": 2})), DataBindingBehaviour::EXPANDING)
            .unwrap()
            .drive(&mut ctx, DataBindingBehaviour::EXPANDING, None, |c, ordinal| {
                if ordinal == 1 {
                    assert_eq!(c.current_key(), Some("b"));
                    Err("boom")
                } else {
                    Ok(())
                }
            });

        assert_eq!(result, Err("boom"));
        assert_eq!(ctx.data_stack().depth(), 1);
        assert_eq!(ctx.current_key(), Some("k"));
        assert_eq!(ctx.current_index(), 0);
    }
}
