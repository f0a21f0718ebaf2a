// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment preference trees.
//!
//! Every server keeps a small tree of __deployment preferences__ that
//! describes how its modules get published. The tree has three levels:
//!
//! 1. [`DeploymentPreferences`]: the root, grouping everything by deployment
//!    type, e.g., "local" for publishing to the local filesystem. Holds its
//!    own flat key-value properties too.
//! 2. [`DeploymentTypePrefs`]: preferences of one deployment type. Holds its
//!    own flat key-value properties plus per-module preferences.
//! 3. [`DeploymentModulePrefs`]: flat key-value properties of one module.
//!
//! # Document Layout
//!
//! The tree is persisted as an XML document:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <deployment>
//!   <property key="owner" value="eap-local"/>
//!   <local>
//!     <property key="deployDir" value="/srv/deploy"/>
//!     <module id="app.war">
//!       <property key="outputName" value="app.war"/>
//!     </module>
//!   </local>
//! </deployment>
//! ```
//!
//! Each deployment type is a child element of the root named after the type.
//! Because of that, "property" cannot name a deployment type.
//!
//! The document is not validated against any schema. Elements that are not
//! understood are kept, and written back on save.
//!
//! # Views Over The Document
//!
//! The document itself is the only copy of the data. Type and module
//! preferences are borrowed views over document nodes, so every mutation
//! lands in the document immediately and there is no cache to flush. Views
//! borrowed immutably expose lookups only. Views borrowed mutably also expose
//! setters and get-or-create accessors.

pub mod memento;

use crate::prefs::memento::{Memento, MementoError};

use mkdirp::mkdirp;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::File,
    io::{BufWriter, ErrorKind, Read},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Element name of document root.
pub const ROOT_ELEMENT: &str = "deployment";

const MODULE_ELEMENT: &str = "module";
const PROPERTY_ELEMENT: &str = "property";
const ID_ATTRIBUTE: &str = "id";
const KEY_ATTRIBUTE: &str = "key";
const VALUE_ATTRIBUTE: &str = "value";

/// Root of a deployment preference tree.
///
/// Groups [`DeploymentTypePrefs`] by deployment type name.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DeploymentPreferences {
    root: Memento,
}

impl DeploymentPreferences {
    /// Construct new empty preference tree.
    pub fn new() -> Self {
        Self {
            root: Memento::new(ROOT_ELEMENT),
        }
    }

    /// Load preference tree from optional byte stream.
    ///
    /// An absent stream yields an empty tree.
    ///
    /// # Errors
    ///
    /// - Return [`PrefsError::Read`] if stream cannot be read.
    /// - Return [`PrefsError::Memento`] if stream is not a well-formed
    ///   document.
    /// - Return [`PrefsError::UnexpectedRoot`] if document root is not a
    ///   deployment element.
    pub fn load(stream: Option<&mut dyn Read>) -> Result<Self> {
        let Some(stream) = stream else {
            return Ok(Self::new());
        };

        let mut data = String::new();
        stream.read_to_string(&mut data).map_err(PrefsError::Read)?;
        data.parse()
    }

    /// Load preference tree from file.
    ///
    /// A file that does not exist, or cannot be opened, yields an empty tree.
    ///
    /// # Errors
    ///
    /// - Return [`PrefsError::ReadFile`] if opened file cannot be read.
    /// - Return [`PrefsError::Memento`] if file is not a well-formed
    ///   document.
    /// - Return [`PrefsError::UnexpectedRoot`] if document root is not a
    ///   deployment element.
    #[instrument(skip(path), level = "debug")]
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no deployment preferences at {:?}", path.display());
                return Ok(Self::new());
            }
            Err(err) => {
                warn!(
                    "cannot open deployment preferences at {:?}, using empty set: {err}",
                    path.display()
                );
                return Ok(Self::new());
            }
        };

        Self::load(Some(&mut file)).map_err(|err| match err {
            PrefsError::Read(source) => PrefsError::ReadFile {
                source,
                path: path.to_path_buf(),
            },
            other => other,
        })
    }

    /// Serialize full preference tree into stream.
    ///
    /// # Errors
    ///
    /// - Return [`PrefsError::Memento`] if stream cannot be written to.
    pub fn save(&self, out: impl std::io::Write) -> Result<()> {
        Ok(self.root.write_to(out)?)
    }

    /// Serialize full preference tree into file.
    ///
    /// Creates missing parent directories of the file first.
    ///
    /// # Errors
    ///
    /// - Return [`PrefsError::CreateDir`] if parent directories cannot be
    ///   created.
    /// - Return [`PrefsError::WriteFile`] if file cannot be created.
    /// - Return [`PrefsError::Memento`] if file cannot be written to.
    #[instrument(skip(self, path), level = "debug")]
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            mkdirp(parent).map_err(|source| PrefsError::CreateDir {
                source,
                path: parent.to_path_buf(),
            })?;
        }

        let file = File::create(path).map_err(|source| PrefsError::WriteFile {
            source,
            path: path.to_path_buf(),
        })?;
        debug!("save deployment preferences to {:?}", path.display());

        self.save(BufWriter::new(file))
    }

    /// Lookup root property value by key.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        property(&self.root, key)
    }

    /// List all root properties in document order.
    pub fn properties(&self) -> Vec<(&str, &str)> {
        properties(&self.root)
    }

    /// Set root property value.
    ///
    /// Overwrites first property with matching key, or appends a new one.
    pub fn set_property(&mut self, key: &str, value: &str) {
        set_property(&mut self.root, key, value);
    }

    /// Remove first root property with matching key, returning its value.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        remove_property(&mut self.root, key)
    }

    /// List names of all deployment types in document order.
    pub fn deployment_types(&self) -> Vec<&str> {
        self.root
            .children()
            .map(Memento::name)
            .filter(|name| *name != PROPERTY_ELEMENT)
            .collect()
    }

    /// Lookup preferences of deployment type.
    pub fn get_preferences(&self, type_id: &str) -> Option<DeploymentTypePrefs<&Memento>> {
        self.root
            .find_child_named(type_id)
            .map(|node| DeploymentTypePrefs { node })
    }

    /// Lookup preferences of deployment type for mutation.
    pub fn get_preferences_mut(
        &mut self,
        type_id: &str,
    ) -> Option<DeploymentTypePrefs<&mut Memento>> {
        self.root
            .find_child_named_mut(type_id)
            .map(|node| DeploymentTypePrefs { node })
    }

    /// Get preferences of deployment type, creating them when missing.
    pub fn get_or_create_preferences(&mut self, type_id: &str) -> DeploymentTypePrefs<&mut Memento> {
        DeploymentTypePrefs {
            node: self.root.get_or_create_child_named(type_id),
        }
    }

    /// Treat preference tree as its backing document root.
    pub fn as_memento(&self) -> &Memento {
        &self.root
    }
}

impl Default for DeploymentPreferences {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for DeploymentPreferences {
    type Err = PrefsError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let root: Memento = data.parse()?;

        // INVARIANT: Only accept documents rooted at a deployment element.
        if root.name() != ROOT_ELEMENT {
            return Err(PrefsError::UnexpectedRoot {
                found: root.name().to_string(),
            });
        }

        Ok(Self { root })
    }
}

impl Display for DeploymentPreferences {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.root, fmt)
    }
}

/// Preferences of one deployment type.
///
/// Holds flat key-value properties, and preferences for each module deployed
/// through this deployment type.
#[derive(Debug)]
pub struct DeploymentTypePrefs<M> {
    node: M,
}

impl<M> DeploymentTypePrefs<M>
where
    M: Deref<Target = Memento>,
{
    /// Name of deployment type.
    pub fn id(&self) -> &str {
        self.node.name()
    }

    /// Lookup property value by key.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        property(&self.node, key)
    }

    /// List all properties in document order.
    pub fn properties(&self) -> Vec<(&str, &str)> {
        properties(&self.node)
    }

    /// List identifiers of all modules in document order.
    pub fn module_ids(&self) -> Vec<&str> {
        self.node
            .children_named(MODULE_ELEMENT)
            .filter_map(|node| node.attribute(ID_ATTRIBUTE))
            .collect()
    }

    /// Lookup preferences of module.
    pub fn get_module_prefs(&self, module_id: &str) -> Option<DeploymentModulePrefs<&Memento>> {
        self.node
            .find_child(MODULE_ELEMENT, ID_ATTRIBUTE, module_id)
            .map(|node| DeploymentModulePrefs { node })
    }
}

impl<M> DeploymentTypePrefs<M>
where
    M: DerefMut<Target = Memento>,
{
    /// Set property value.
    ///
    /// Overwrites first property with matching key, or appends a new one.
    pub fn set_property(&mut self, key: &str, value: &str) {
        set_property(&mut self.node, key, value);
    }

    /// Remove first property with matching key, returning its value.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        remove_property(&mut self.node, key)
    }

    /// Lookup preferences of module for mutation.
    pub fn get_module_prefs_mut(
        &mut self,
        module_id: &str,
    ) -> Option<DeploymentModulePrefs<&mut Memento>> {
        self.node
            .find_child_mut(MODULE_ELEMENT, ID_ATTRIBUTE, module_id)
            .map(|node| DeploymentModulePrefs { node })
    }

    /// Get preferences of module, creating them when missing.
    pub fn get_or_create_module_prefs(
        &mut self,
        module_id: &str,
    ) -> DeploymentModulePrefs<&mut Memento> {
        DeploymentModulePrefs {
            node: self
                .node
                .get_or_create_child(MODULE_ELEMENT, ID_ATTRIBUTE, module_id),
        }
    }
}

/// Preferences of one module.
///
/// Leaf of the preference tree.
#[derive(Debug)]
pub struct DeploymentModulePrefs<M> {
    node: M,
}

impl<M> DeploymentModulePrefs<M>
where
    M: Deref<Target = Memento>,
{
    /// Identifier of module.
    pub fn id(&self) -> &str {
        self.node.attribute(ID_ATTRIBUTE).unwrap_or_default()
    }

    /// Lookup property value by key.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        property(&self.node, key)
    }

    /// List all properties in document order.
    pub fn properties(&self) -> Vec<(&str, &str)> {
        properties(&self.node)
    }
}

impl<M> DeploymentModulePrefs<M>
where
    M: DerefMut<Target = Memento>,
{
    /// Set property value.
    ///
    /// Overwrites first property with matching key, or appends a new one.
    pub fn set_property(&mut self, key: &str, value: &str) {
        set_property(&mut self.node, key, value);
    }

    /// Remove first property with matching key, returning its value.
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        remove_property(&mut self.node, key)
    }
}

fn property<'a>(node: &'a Memento, key: &str) -> Option<&'a str> {
    node.find_child(PROPERTY_ELEMENT, KEY_ATTRIBUTE, key)
        .and_then(|property| property.attribute(VALUE_ATTRIBUTE))
}

fn properties(node: &Memento) -> Vec<(&str, &str)> {
    node.children_named(PROPERTY_ELEMENT)
        .filter_map(|property| {
            Some((
                property.attribute(KEY_ATTRIBUTE)?,
                property.attribute(VALUE_ATTRIBUTE).unwrap_or_default(),
            ))
        })
        .collect()
}

fn set_property(node: &mut Memento, key: &str, value: &str) {
    match node.find_child_mut(PROPERTY_ELEMENT, KEY_ATTRIBUTE, key) {
        Some(property) => property.set_attribute(VALUE_ATTRIBUTE, value),
        None => {
            let property = node.create_child(PROPERTY_ELEMENT);
            property.set_attribute(KEY_ATTRIBUTE, key);
            property.set_attribute(VALUE_ATTRIBUTE, value);
        }
    }
}

fn remove_property(node: &mut Memento, key: &str) -> Option<String> {
    node.remove_child(PROPERTY_ELEMENT, KEY_ATTRIBUTE, key)
        .and_then(|property| property.attribute(VALUE_ATTRIBUTE).map(ToString::to_string))
}

/// Deployment preference error types.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// Preference document cannot be parsed or written.
    #[error(transparent)]
    Memento(#[from] MementoError),

    /// Preference document is rooted at the wrong element.
    #[error("expected <deployment> document root, found <{found}>")]
    UnexpectedRoot { found: String },

    /// Preference stream cannot be read.
    #[error("failed to read deployment preferences")]
    Read(#[source] std::io::Error),

    /// Preference file cannot be read.
    #[error("failed to read deployment preferences at {:?}", path.display())]
    ReadFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Preference file cannot be created.
    #[error("failed to write deployment preferences at {:?}", path.display())]
    WriteFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Parent directory of preference file cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PrefsError> = std::result::Result<T, E>;
