use crate::collection::Document;
use crate::errors::NestResult;
use crate::mapper::NestMapper;
use std::any::Any;

/// A composite domain type that the mapper decomposes field by field.
///
/// Both directions receive the mapper so nested composite fields can recurse
/// through it (see [`NestMapper::write_field`] and [`NestMapper::read_field`]).
/// Conversion copies values; a written [`Document`] never shares state with the
/// object it came from.
///
/// # Examples
///
/// ```rust
/// use nestdb::collection::Document;
/// use nestdb::errors::NestResult;
/// use nestdb::mapper::{Convertible, NestMapper};
///
/// #[derive(Default)]
/// struct Employee {
///     emp_id: u64,
///     name: String,
/// }
///
/// impl Convertible for Employee {
///     fn write(&self, mapper: &NestMapper) -> NestResult<Document> {
///         let mut doc = Document::new();
///         mapper.write_field(&mut doc, "empId", &self.emp_id)?;
///         mapper.write_field(&mut doc, "name", &self.name)?;
///         Ok(doc)
///     }
///
///     fn read(&mut self, mapper: &NestMapper, doc: &Document) -> NestResult<()> {
///         self.emp_id = mapper.read_field(doc, "empId")?.unwrap_or_default();
///         self.name = mapper.read_field(doc, "name")?.unwrap_or_default();
///         Ok(())
///     }
///
///     fn instantiate() -> Option<Self> {
///         Some(Employee::default())
///     }
/// }
/// ```
pub trait Convertible: Any {
    /// Renders this value into a new document.
    fn write(&self, mapper: &NestMapper) -> NestResult<Document>;

    /// Populates this value from `document`.
    fn read(&mut self, mapper: &NestMapper, document: &Document) -> NestResult<()>;

    /// Default construction used when no factory is registered for the type.
    ///
    /// Types that cannot offer a blank instance keep the default `None` and
    /// rely on a registered factory instead.
    fn instantiate() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

impl Convertible for Document {
    fn write(&self, _mapper: &NestMapper) -> NestResult<Document> {
        Ok(self.clone())
    }

    fn read(&mut self, _mapper: &NestMapper, document: &Document) -> NestResult<()> {
        *self = document.clone();
        Ok(())
    }

    fn instantiate() -> Option<Self> {
        Some(Document::new())
    }
}
