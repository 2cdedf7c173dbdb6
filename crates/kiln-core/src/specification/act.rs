//! The job or transformation a test triggers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::scalar_text;
use crate::error::{ParamError, SpecError};
use crate::runtime::RuntimeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Job,
    Transformation,
}

impl FromStr for JobType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "job" => Ok(JobType::Job),
            "transformation" => Ok(JobType::Transformation),
            _ => Err(SpecError::UnknownActType(s.to_string())),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobType::Job => write!(f, "job"),
            JobType::Transformation => write!(f, "transformation"),
        }
    }
}

/// What the executor should run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRef {
    pub repository: String,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
}

/// Executor parameters before resolution.
///
/// `files` map a param name to a path under the files directory and resolve to
/// its absolute path. `keys` map a param name to a template over the runtime
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params {
    files: BTreeMap<String, String>,
    keys: BTreeMap<String, String>,
}

impl Params {
    pub fn new(
        files: BTreeMap<String, String>,
        keys: BTreeMap<String, String>,
    ) -> Result<Self, SpecError> {
        if let Some(dup) = files.keys().find(|name| keys.contains_key(*name)) {
            return Err(SpecError::DuplicateParam(dup.clone()));
        }
        Ok(Self { files, keys })
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.keys.is_empty()
    }

    /// Param name to path relative to the files directory
    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    /// Param name to runtime template
    pub fn keys(&self) -> &BTreeMap<String, String> {
        &self.keys
    }

    pub fn compile(
        &self,
        files_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<BTreeMap<String, String>, ParamError> {
        let mut compiled = BTreeMap::new();

        for (param, relative) in &self.files {
            let absolute = std::path::absolute(files_dir.join(relative)).map_err(|e| {
                ParamError::File {
                    param: param.clone(),
                    message: e.to_string(),
                }
            })?;
            let absolute = absolute.to_str().ok_or_else(|| ParamError::File {
                param: param.clone(),
                message: "path is not valid UTF-8".to_string(),
            })?;
            compiled.insert(param.clone(), absolute.to_string());
        }

        for (param, template) in &self.keys {
            compiled.insert(param.clone(), runtime.render(param, template)?);
        }

        Ok(compiled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Act {
    job: JobRef,
    params: Params,
}

impl Act {
    pub fn new(
        repository: impl Into<String>,
        name: impl Into<String>,
        job_type: JobType,
        params: Params,
    ) -> Result<Self, SpecError> {
        let repository = repository.into();
        let name = name.into();

        if repository.trim().is_empty() {
            return Err(SpecError::MissingField("act.repository"));
        }
        if name.trim().is_empty() {
            return Err(SpecError::MissingField("act.name"));
        }

        Ok(Self {
            job: JobRef {
                repository,
                name,
                job_type,
            },
            params,
        })
    }

    pub fn job(&self) -> &JobRef {
        &self.job
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn compiled_params(
        &self,
        files_dir: &Path,
        runtime: &RuntimeConfig,
    ) -> Result<BTreeMap<String, String>, ParamError> {
        self.params.compile(files_dir, runtime)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ActDocument {
    repository: String,
    name: String,
    #[serde(rename = "type")]
    job_type: String,
    params: ParamsDocument,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ParamsDocument {
    files: BTreeMap<String, serde_yaml::Value>,
    keys: BTreeMap<String, serde_yaml::Value>,
}

/// Params are passed on the command line, so numbers and booleans are taken
/// as their YAML text.
fn param_text(
    section: &str,
    values: BTreeMap<String, serde_yaml::Value>,
) -> Result<BTreeMap<String, String>, SpecError> {
    values
        .into_iter()
        .map(|(name, value)| match scalar_text(&value) {
            Some(text) => Ok((name, text)),
            None => Err(SpecError::Malformed(format!(
                "act.params.{}.{} must be a string, number or boolean",
                section, name
            ))),
        })
        .collect()
}

impl TryFrom<ActDocument> for Act {
    type Error = SpecError;

    fn try_from(doc: ActDocument) -> Result<Self, Self::Error> {
        if doc.job_type.trim().is_empty() {
            return Err(SpecError::MissingField("act.type"));
        }
        let job_type = doc.job_type.parse()?;
        let params = Params::new(
            param_text("files", doc.params.files)?,
            param_text("keys", doc.params.keys)?,
        )?;

        Act::new(doc.repository, doc.name, job_type, params)
    }
}
