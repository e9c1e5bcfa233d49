use super::longitudinal::sort_refsets;
use super::refset::Refset;
use super::RefsetError;
use crate::models::FieldValue;

/// One field projected across a subject's snapshots, in snapshot order.
/// A filter, once applied, is sticky: it survives re-ordering until
/// [`Fieldset::all`] rebuilds the unfiltered projection.
///
/// The projection owns its snapshots as of creation time. Re-ordering the
/// parent series afterwards does not propagate here; either re-order through
/// [`Fieldset::order_by`] or take a fresh `fieldset()` from the series.
#[derive(Debug, Clone)]
pub struct Fieldset {
    field: String,
    refsets: Vec<Refset>,
    values: Vec<Option<FieldValue>>,
    filter_values: Option<Vec<FieldValue>>,
}

impl Fieldset {
    pub(crate) fn new(field: &str, refsets: Vec<Refset>) -> Self {
        let values = refsets.iter().map(|r| r.attr_value(field)).collect();
        Self {
            field: field.to_string(),
            refsets,
            values,
            filter_values: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Rebuild the unfiltered projection. The sticky filter is kept and can
    /// be re-applied with [`Fieldset::filter`].
    pub fn all(&mut self) -> &mut Self {
        self.values = self.refsets.iter().map(|r| r.attr_value(&self.field)).collect();
        self
    }

    /// Keep only values in `allowed`, dropping missing values too. An empty
    /// `allowed` list is a no-op. The filter persists across re-ordering.
    pub fn filter(&mut self, allowed: &[FieldValue]) -> &mut Self {
        if allowed.is_empty() {
            return self;
        }
        self.values.retain(|v| match v {
            Some(value) => allowed.contains(value),
            None => false,
        });
        self.filter_values = Some(allowed.to_vec());
        self
    }

    /// Re-order the underlying snapshots and rebuild the projection,
    /// re-applying any sticky filter.
    pub fn order_by(&mut self, field: &str, descending: bool) -> Result<&mut Self, RefsetError> {
        if self.refsets.is_empty() {
            return Ok(self);
        }
        if !self.refsets[0].has_attr(field) {
            return Err(RefsetError::InvalidOrdering(field.to_string()));
        }
        sort_refsets(&mut self.refsets, field, descending);
        self.all();
        if let Some(allowed) = self.filter_values.take() {
            self.filter(&allowed);
        }
        Ok(self)
    }

    /// First value, or the first occurrence of `needle` when given.
    pub fn first(&self, needle: Option<&FieldValue>) -> Option<&FieldValue> {
        match needle {
            Some(needle) => self
                .values
                .iter()
                .flatten()
                .find(|v| *v == needle),
            None => self.values.first().and_then(|v| v.as_ref()),
        }
    }

    /// Last value, or the last occurrence of `needle` when given.
    pub fn last(&self, needle: Option<&FieldValue>) -> Option<&FieldValue> {
        match needle {
            Some(needle) => self
                .values
                .iter()
                .flatten()
                .rev()
                .find(|v| *v == needle),
            None => self.values.last().and_then(|v| v.as_ref()),
        }
    }

    pub fn values(&self) -> &[Option<FieldValue>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::ops::Index<usize> for Fieldset {
    type Output = Option<FieldValue>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl<'a> IntoIterator for &'a Fieldset {
    type Item = &'a Option<FieldValue>;
    type IntoIter = std::slice::Iter<'a, Option<FieldValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
