//! Subcommand implementations over burrow-core.

use std::path::{Path, PathBuf};
use std::process::Command;

use burrow_core::{
    context, extensions, identity, registry, ArchiveManager, BurrowConfig, BurrowError,
    HookRegistry, Result, SessionContext, SessionController, SessionTracker, StorageConfig,
    SwitchOutcome, Workspace,
};

pub struct App {
    storage: StorageConfig,
    config: BurrowConfig,
    hooks: HookRegistry,
}

impl App {
    /// Loads configuration and installs extensions over resolved storage.
    pub fn bootstrap(storage: StorageConfig) -> Result<Self> {
        storage
            .ensure_dirs()
            .map_err(|err| BurrowError::io("creating burrow directories", err))?;
        let config = BurrowConfig::load(&storage)?;

        let mut hooks = HookRegistry::new();
        extensions::install(&storage, &config, &mut hooks);

        Ok(Self {
            storage,
            config,
            hooks,
        })
    }

    fn controller(&self) -> SessionController<'_> {
        SessionController::new(&self.storage, &self.config, &self.hooks)
    }

    fn archive_manager(&self) -> ArchiveManager {
        ArchiveManager::new(&self.storage, &self.config)
    }

    /// Resolves a workspace from an identifier or a path.
    fn resolve(&self, spec: &str) -> Result<Workspace> {
        if identity::is_identifier(spec) {
            Workspace::load_by_id(&self.storage, spec)
        } else {
            Workspace::load(&self.storage, Path::new(spec))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registry commands
    // ─────────────────────────────────────────────────────────────────────

    pub fn add(&self, path: Option<PathBuf>) -> Result<()> {
        let path = path.unwrap_or_else(|| PathBuf::from("."));
        let workspace = Workspace::init(&self.storage, &path)?;
        println!("{}  {}", workspace.id(), workspace.path().display());
        Ok(())
    }

    pub fn delete(&self, target: Option<String>, yes: bool) -> Result<()> {
        let spec = target.unwrap_or_else(|| ".".to_string());
        let workspace = self.resolve(&spec)?;

        if !yes {
            let question = format!(
                "Delete workspace {} at {}? (files are kept)",
                workspace.id(),
                workspace.path().display()
            );
            if !crate::prompt::confirm(&question)? {
                return Ok(());
            }
        }

        Workspace::delete(&self.storage, workspace.path())?;
        Ok(())
    }

    pub fn list(&self) -> Result<()> {
        let current = std::env::var(context::ENV_ID).ok();

        for (id, target) in registry::entries(&self.storage)? {
            let marker = if current.as_deref() == Some(id.as_str()) {
                "*"
            } else {
                " "
            };
            if Workspace::is_workspace(&self.storage, &target) {
                let count = SessionTracker::new(&self.storage, &id).count()?;
                let sessions = match count {
                    0 => String::new(),
                    n => format!("  ({n} active)"),
                };
                println!("{marker} {id}  {}{sessions}", target.display());
            } else {
                println!("{marker} {id}  {}  (broken)", target.display());
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session commands
    // ─────────────────────────────────────────────────────────────────────

    pub fn enter(&self, target: &str) -> Result<()> {
        let workspace = self.resolve(target)?;
        self.controller().push(workspace.path())
    }

    pub fn select(&self) -> Result<()> {
        let entries = registry::entries(&self.storage)?;
        if entries.is_empty() {
            eprintln!("no workspaces registered");
            return Ok(());
        }

        for (i, (id, target)) in entries.iter().enumerate() {
            eprintln!("{:>3}  {id}  {}", i + 1, target.display());
        }
        let Some(index) = crate::prompt::select(entries.len())? else {
            return Ok(());
        };

        let (_, target) = &entries[index];
        self.controller().push(target)
    }

    pub fn switch(&self, target: &str) -> Result<()> {
        let workspace = self.resolve(target)?;
        match self.controller().switch(&workspace)? {
            SwitchOutcome::Entered | SwitchOutcome::Signaled => Ok(()),
            SwitchOutcome::SameWorkspace(path) => {
                // Already there: degenerate to a directory change, which the
                // shell wrapper performs from this output.
                println!("{}", path.display());
                Ok(())
            }
        }
    }

    pub fn unload(&self) -> Result<()> {
        self.controller().unload()
    }

    pub fn reload(&self) -> Result<()> {
        self.controller().reload()
    }

    pub fn rehash(&self) -> Result<()> {
        let script = self.controller().rehash()?;
        println!("{}", script.display());
        Ok(())
    }

    pub fn configure(&self, target: Option<String>, exit: bool) -> Result<()> {
        let workspace = match target {
            Some(spec) => self.resolve(&spec)?,
            None => match SessionContext::current() {
                Ok(ctx) => Workspace::load(&self.storage, &ctx.workspace)?,
                Err(BurrowError::NotInSession) => {
                    Workspace::load(&self.storage, Path::new("."))?
                }
                Err(err) => return Err(err),
            },
        };

        let script = if exit {
            workspace.exit_script()
        } else {
            workspace.enter_script()
        };

        let editor = self.config.resolve_editor();
        let mut words = editor.split_whitespace();
        let program = words.next().ok_or_else(|| BurrowError::CommandFailed {
            command: editor.clone(),
            details: "empty editor command".to_string(),
        })?;

        let status = Command::new(program)
            .args(words)
            .arg(&script)
            .status()
            .map_err(|err| BurrowError::CommandFailed {
                command: editor.clone(),
                details: err.to_string(),
            })?;
        if !status.success() {
            return Err(BurrowError::CommandFailed {
                command: editor,
                details: format!("exit code {:?}", status.code()),
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Relative helpers (active workspace scope)
    // ─────────────────────────────────────────────────────────────────────

    fn workspace_relative(&self, rel: Option<&str>) -> Result<PathBuf> {
        let ctx = SessionContext::current()?;
        let path = match rel {
            Some(rel) => ctx.workspace.join(rel),
            None => ctx.workspace,
        };
        fs_err::canonicalize(&path)
            .map_err(|err| BurrowError::io(format!("resolving {}", path.display()), err))
    }

    pub fn path(&self, rel: Option<&str>) -> Result<()> {
        println!("{}", self.workspace_relative(rel)?.display());
        Ok(())
    }

    pub fn ls(&self, rel: Option<&str>) -> Result<()> {
        let base = self.workspace_relative(rel)?;
        let mut names = Vec::new();
        for entry in
            fs_err::read_dir(&base).map_err(|err| BurrowError::io("listing workspace", err))?
        {
            let entry = entry.map_err(|err| BurrowError::io("listing workspace", err))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        for name in names {
            println!("{name}");
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Archive commands
    // ─────────────────────────────────────────────────────────────────────

    pub fn archive_create(
        &self,
        target: &str,
        description: Option<String>,
        yes: bool,
    ) -> Result<()> {
        let workspace = self.resolve(target)?;

        if !yes {
            let question = format!(
                "Archive workspace {} at {}? (directory is replaced by an image)",
                workspace.id(),
                workspace.path().display()
            );
            if !crate::prompt::confirm(&question)? {
                return Ok(());
            }
        }

        let record = self
            .archive_manager()
            .archive(workspace.id(), description)?;
        println!(
            "archived {} ({} bytes) -> {}",
            record.id,
            record.size_bytes,
            self.storage.archive_image(&record.id).display()
        );
        Ok(())
    }

    pub fn archive_restore(&self, id: &str) -> Result<()> {
        let record = self.archive_manager().restore(id)?;
        println!("restored {} -> {}", record.id, record.original_path.display());
        Ok(())
    }

    pub fn archive_mount(&self, id: &str) -> Result<()> {
        let mount_point = self.archive_manager().mount(id)?;
        println!("{}", mount_point.display());
        Ok(())
    }

    pub fn archive_unmount(&self, id: &str) -> Result<()> {
        self.archive_manager().unmount(id)
    }

    pub fn archive_list(&self) -> Result<()> {
        for record in self.archive_manager().list()? {
            let description = record.description.as_deref().unwrap_or("-");
            println!(
                "{}  {}  {}  {}",
                record.id,
                record.created.format("%Y-%m-%d"),
                record.original_path.display(),
                description
            );
        }
        Ok(())
    }
}
