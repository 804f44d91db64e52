use chrono::{DateTime, TimeZone, Utc};
use nestdb::collection::{Document, NestCollection};
use nestdb::doc;
use nestdb::errors::{NestError, NestResult};
use nestdb::mapper::{Convertible, NestMapper};
use nestdb::nest::Nest;
use nestdb::nest_builder::NestBuilder;
use std::panic::{self, AssertUnwindSafe};
use std::{env, fs, thread};
use std::time::Duration;

/// Runs `test` on a fresh context and always hands the context to `after`,
/// whether the test returned an error, panicked or passed.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: FnOnce() -> NestResult<TestContext>,
    T: FnOnce(TestContext) -> NestResult<()>,
    A: FnOnce(TestContext) -> NestResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
    let after_result = after(ctx);

    match result {
        Ok(Ok(())) => {
            if let Err(e) = after_result {
                panic!("After run failed: {:?}", e);
            }
        }
        Ok(Err(e)) => panic!("Test failed: {:?}", e),
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[derive(Clone)]
pub struct TestContext {
    path: String,
    db: Nest,
}

impl TestContext {
    pub fn new(path: String, db: Nest) -> Self {
        Self { path, db }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn db(&self) -> Nest {
        self.db.clone()
    }
}

pub fn random_path() -> String {
    env::temp_dir()
        .join(format!("nestdb-it-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

/// Builder with the mapper registrations every integration test relies on.
pub fn test_builder() -> NestBuilder {
    Nest::builder()
        .register_convertible::<Employee>()
        .register_convertible::<Note>()
}

/// Opens a durable database at `path`, creating it when missing.
pub fn open_at(path: &str) -> NestResult<Nest> {
    open_with(test_builder(), path)
}

/// Opens `builder` on the test storage engine at `path`.
#[cfg(feature = "fjall")]
pub fn open_with(builder: NestBuilder, path: &str) -> NestResult<Nest> {
    use nestdb_fjall_adapter::FjallModule;

    // one flush and one compaction worker per database
    let module = FjallModule::with_config()
        .low_memory_preset()
        .db_path(path)
        .build();
    builder.load_module(module).open_or_create()
}

#[cfg(not(feature = "fjall"))]
pub fn open_with(builder: NestBuilder, _path: &str) -> NestResult<Nest> {
    builder.open_or_create()
}

pub fn create_test_context() -> NestResult<TestContext> {
    let path = random_path();
    match open_at(&path) {
        Ok(db) => Ok(TestContext::new(path, db)),
        Err(e) => {
            let _ = fs::remove_dir_all(&path);
            Err(e)
        }
    }
}

pub fn cleanup(ctx: TestContext) -> NestResult<()> {
    if !ctx.db().is_closed()? {
        ctx.db().close()?;
    }
    remove_dir(ctx.path());
    Ok(())
}

/// Removes a database directory, retrying while the engine releases its files.
pub fn remove_dir(path: &str) {
    const MAX_RETRIES: u32 = 10;
    for attempt in 1..=MAX_RETRIES {
        if !std::path::Path::new(path).exists() {
            return;
        }
        match fs::remove_dir_all(path) {
            Ok(_) => return,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) if attempt == MAX_RETRIES => {
                eprintln!("Warning: Failed to remove test directory {}: {:?}", path, e);
            }
            Err(_) => thread::sleep(Duration::from_millis(20 * attempt as u64)),
        }
    }
}

pub fn create_test_docs() -> Vec<Document> {
    let dt1 = date(2012, 7, 1);
    let dt2 = date(2010, 6, 12);
    let dt3 = date(2014, 4, 17);

    let doc1 = doc! {
        first_name: "fn1",
        last_name: "ln1",
        birth_day: dt1,
        data: (vec![1u8, 2u8, 3u8]),
        arr: [1, 2, 3],
        body: "a quick brown fox jump over the lazy dog",
    };

    let doc2 = doc! {
        first_name: "fn2",
        last_name: "ln2",
        birth_day: dt2,
        data: (vec![3u8, 4u8, 3u8]),
        arr: [3, 4, 3],
        body: "quick hello world from nest",
    };

    let doc3 = doc! {
        first_name: "fn3",
        last_name: "ln2",
        birth_day: dt3,
        data: (vec![9u8, 4u8, 8u8]),
        arr: [9, 4, 8],
        body: "Lorem ipsum dolor sit amet, consectetur \
        adipiscing elit. Sed nunc mi, mattis ullamcorper \
        dignissim vitae, condimentum non lorem.",
    };

    vec![doc1, doc2, doc3]
}

pub fn insert_test_documents(collection: &NestCollection) -> NestResult<()> {
    collection.insert_many(create_test_docs())?;
    Ok(())
}

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn to_error(message: &str) -> NestError {
    NestError::new(message, nestdb::errors::ErrorKind::InternalError)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub note_id: i64,
    pub text: String,
}

impl Convertible for Note {
    fn write(&self, mapper: &NestMapper) -> NestResult<Document> {
        let mut doc = Document::new();
        mapper.write_field(&mut doc, "noteId", &self.note_id)?;
        mapper.write_field(&mut doc, "text", &self.text)?;
        Ok(doc)
    }

    fn read(&mut self, mapper: &NestMapper, document: &Document) -> NestResult<()> {
        self.note_id = mapper.read_field(document, "noteId")?.unwrap_or_default();
        self.text = mapper.read_field(document, "text")?.unwrap_or_default();
        Ok(())
    }

    fn instantiate() -> Option<Self> {
        Some(Note::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Employee {
    pub emp_id: u64,
    pub name: String,
    pub join_date: Option<DateTime<Utc>>,
    pub salary: f64,
    pub skills: Vec<String>,
    pub note: Option<Note>,
}

impl Convertible for Employee {
    fn write(&self, mapper: &NestMapper) -> NestResult<Document> {
        let mut doc = Document::new();
        mapper.write_field(&mut doc, "empId", &self.emp_id)?;
        mapper.write_field(&mut doc, "name", &self.name)?;
        if let Some(join_date) = &self.join_date {
            mapper.write_field(&mut doc, "joinDate", join_date)?;
        }
        mapper.write_field(&mut doc, "salary", &self.salary)?;
        doc.put("skills", mapper.to_array(&self.skills)?)?;
        if let Some(note) = &self.note {
            mapper.write_field(&mut doc, "employeeNote", note)?;
        }
        Ok(doc)
    }

    fn read(&mut self, mapper: &NestMapper, document: &Document) -> NestResult<()> {
        self.emp_id = mapper.read_field(document, "empId")?.unwrap_or_default();
        self.name = mapper.read_field(document, "name")?.unwrap_or_default();
        self.join_date = mapper.read_field(document, "joinDate")?;
        self.salary = mapper.read_field(document, "salary")?.unwrap_or_default();
        self.skills = match document.get("skills") {
            Some(value) => mapper.from_array(&value)?,
            None => Vec::new(),
        };
        self.note = mapper.read_field(document, "employeeNote")?;
        Ok(())
    }

    fn instantiate() -> Option<Self> {
        Some(Employee::default())
    }
}

pub fn employee(emp_id: u64, name: &str) -> Employee {
    Employee {
        emp_id,
        name: name.to_string(),
        join_date: Some(date(2020, 1, (emp_id % 28) as u32 + 1)),
        salary: 1_000.0 * emp_id as f64,
        skills: vec!["rust".to_string(), format!("skill-{}", emp_id)],
        note: Some(Note {
            note_id: emp_id as i64,
            text: format!("note of {}", name),
        }),
    }
}
