//! Runs the whole pipeline and, for executables, the external assembler and linker.
use crate::error::{ErrorList, Reporter, SourceMetadata};
use crate::resolve::{ResolveE, ResolveError};
use crate::typechecker::{TypeE, TypeError};
use crate::{asmgen, grammar, ir, qbe, resolve, typechecker};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{fmt, fs, io};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// FASM text for x86-64, assembled straight into an executable
    #[default]
    Amd64,
    /// QBE intermediate language, compiled by `qbe` then assembled and linked
    Qbe,
}

impl Backend {
    /// Extension of the text this backend produces
    pub const fn extension(self) -> &'static str {
        match self {
            Backend::Amd64 => "asm",
            Backend::Qbe => "ssa",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "amd64" | "fasm" => Ok(Backend::Amd64),
            "qbe" => Ok(Backend::Qbe),
            other => Err(format!("unknown backend {:?}, expected amd64 or qbe", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Backend::Amd64 => "amd64",
            Backend::Qbe => "qbe",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub backend: Backend,
    pub print_ast: bool,
    pub print_tast: bool,
    pub print_ir: bool,
}

/// Resolution and type errors share one list
#[derive(Error, Debug, Clone)]
pub enum SemanticError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("parser encountered {0} error(s)")]
    Parse(usize),
    #[error("{0}")]
    Semantic(ErrorList<SemanticError>),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("could not write {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not run {tool:?}: {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("command {tool:?} failed with exit code {code}")]
    Tool { tool: String, code: i32 },
    #[error("output {0:?} would overwrite the input file")]
    OverwritesInput(PathBuf),
}

/// Compiles a source text to the chosen backend's text output.
/// Parse errors go through the default stderr reporter as they are found.
pub fn compile(meta: &SourceMetadata, options: &Options) -> Result<String, CompileError> {
    let mut reporter = Reporter::new();
    let mut program = grammar::parse_program(meta, &mut reporter);
    if reporter.error_count() > 0 {
        return Err(CompileError::Parse(reporter.error_count()));
    }
    if options.print_ast {
        println!("{}", program);
    }

    // names the resolver rejected keep their source name, the checker still runs on them
    let resolved = resolve::resolve(&mut program, meta);
    let checked = typechecker::check_program(&program, meta);
    let program = match (resolved, checked) {
        (Ok(()), Ok(program)) => program,
        (resolved, checked) => {
            let resolve_errors = resolved.err().unwrap_or_default();
            let type_errors = checked.err().unwrap_or_default();
            return Err(semantic(resolve_errors, type_errors));
        }
    };
    if options.print_tast {
        println!("{}", program);
    }

    let program = ir::emit(&program);
    if options.print_ir {
        println!("{}", program);
    }

    let output = match options.backend {
        Backend::Amd64 => asmgen::generate(&program).to_string(),
        Backend::Qbe => {
            let mut buffer = Vec::new();
            qbe::emit(&mut buffer, &program)
                .unwrap_or_else(|error| crate::ice!("writing to memory failed: {}", error));
            String::from_utf8(buffer)
                .unwrap_or_else(|error| crate::ice!("QBE output is not UTF-8: {}", error))
        }
    };
    tracing::debug!(target: "build", "{} backend produced {} bytes", options.backend, output.len());
    Ok(output)
}

// an undeclared variable is already reported by the resolver, the checker's
// "could not get type" for the same name adds nothing
fn semantic(resolve_errors: Vec<ResolveE>, type_errors: Vec<TypeE>) -> CompileError {
    let undeclared: Vec<String> = resolve_errors
        .iter()
        .filter_map(|error| match &error.kind {
            ResolveError::Undeclared(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    let type_errors = type_errors.into_iter().filter(|error| {
        !matches!(&error.kind, TypeError::UnknownVariable(name) if undeclared.contains(name))
    });
    let errors = resolve_errors
        .into_iter()
        .map(|error| error.map_kind(SemanticError::from))
        .chain(type_errors.map(|error| error.map_kind(SemanticError::from)))
        .collect();
    CompileError::Semantic(ErrorList(errors))
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub input: PathBuf,
    /// Defaults to the input without its extension (`.out` when it has none),
    /// or the text file with `assemble_only`
    pub output: Option<PathBuf>,
    /// Stop after writing the backend's text
    pub assemble_only: bool,
    pub compile: Options,
}

impl BuildOptions {
    fn text_path(&self) -> PathBuf {
        let extension = self.compile.backend.extension();
        match (&self.output, self.assemble_only) {
            (Some(output), true) => output.clone(),
            _ => self.input.with_extension(extension),
        }
    }

    fn executable_path(&self) -> PathBuf {
        match &self.output {
            Some(output) => output.clone(),
            None if self.input.extension().is_none() => self.input.with_extension("out"),
            None => self.input.with_extension(""),
        }
    }
}

fn refuse_input(path: &Path, options: &BuildOptions) -> Result<(), BuildError> {
    if path == options.input.as_path() {
        Err(BuildError::OverwritesInput(path.to_path_buf()))
    } else {
        Ok(())
    }
}

/// Compiles `meta` and produces the requested artifact, returning its path.
/// External tools run one after the other, intermediate files are removed afterwards.
pub fn build(meta: &SourceMetadata, options: &BuildOptions) -> Result<PathBuf, BuildError> {
    let text_path = options.text_path();
    refuse_input(&text_path, options)?;
    let executable = options.executable_path();
    if !options.assemble_only {
        refuse_input(&executable, options)?;
    }

    let text = compile(meta, &options.compile)?;
    write_file(&text_path, &text)?;
    if options.assemble_only {
        return Ok(text_path);
    }

    let mut intermediates = vec![text_path.clone()];
    let result = match options.compile.backend {
        Backend::Amd64 => run_tool("fasm", [text_path.as_os_str(), executable.as_os_str()]),
        Backend::Qbe => link_qbe(&text_path, &executable, &mut intermediates),
    };
    for file in intermediates.iter().filter(|file| file.exists()) {
        if let Err(error) = fs::remove_file(file) {
            log::warn!("could not remove {}: {}", file.display(), error);
        }
    }
    result.map(|()| executable)
}

fn link_qbe(ssa: &Path, executable: &Path, intermediates: &mut Vec<PathBuf>) -> Result<(), BuildError> {
    let assembly = ssa.with_extension("s");
    let object = ssa.with_extension("o");
    let stub = ssa.with_extension("stub.s");
    let stub_object = ssa.with_extension("stub.o");
    intermediates.extend([assembly.clone(), object.clone(), stub.clone(), stub_object.clone()]);

    write_file(&stub, qbe::SYSCALL_STUB)?;
    run_tool("qbe", [OsStr::new("-o"), assembly.as_os_str(), ssa.as_os_str()])?;
    run_tool("as", [assembly.as_os_str(), OsStr::new("-o"), object.as_os_str()])?;
    run_tool("as", [stub.as_os_str(), OsStr::new("-o"), stub_object.as_os_str()])?;
    run_tool(
        "ld",
        [
            OsStr::new("-o"),
            executable.as_os_str(),
            object.as_os_str(),
            stub_object.as_os_str(),
        ],
    )
}

fn write_file(path: &Path, contents: &str) -> Result<(), BuildError> {
    log::debug!("writing {}", path.display());
    fs::write(path, contents).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn run_tool<'a>(tool: &str, args: impl IntoIterator<Item = &'a OsStr>) -> Result<(), BuildError> {
    let mut command = Command::new(tool);
    command.args(args);
    log::info!("running {:?}", command);
    let status = command.status().map_err(|source| BuildError::Spawn {
        tool: tool.to_string(),
        source,
    })?;
    tracing::debug!(target: "build", "{} exited with {}", tool, status);
    if status.success() {
        Ok(())
    } else {
        Err(BuildError::Tool {
            tool: tool.to_string(),
            // killed by a signal
            code: status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(backend: Backend) -> Options {
        Options {
            backend,
            ..Options::default()
        }
    }

    #[test]
    fn compiles_to_both_backends() {
        let meta = SourceMetadata::new("fn main(): i64 = 3 + 3 + 3;");
        let asm = compile(&meta, &options(Backend::Amd64)).unwrap();
        assert!(asm.starts_with("format ELF64 executable\n"));
        let ssa = compile(&meta, &options(Backend::Qbe)).unwrap();
        assert!(ssa.contains("export function l $main() {"));
    }

    #[test]
    fn parse_errors_are_counted() {
        let meta = SourceMetadata::new("fn main(): i64 = ;");
        match compile(&meta, &Options::default()) {
            Err(CompileError::Parse(count)) => assert!(count > 0),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn semantic_errors_are_collected() {
        let meta = SourceMetadata::new("fn f(): i64 = true;\nfn g(): bool = 1;");
        let errors = match compile(&meta, &Options::default()) {
            Err(CompileError::Semantic(errors)) => errors,
            other => panic!("unexpected result: {:?}", other),
        };
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|error| matches!(error.kind, SemanticError::Type(TypeError::MissingMain))));
    }

    #[test]
    fn resolution_and_type_errors_are_reported_together() {
        let meta = SourceMetadata::new("fn main(): i64 = { x: i64 = 1; x: i64 = 2; true + 1 };");
        let errors = match compile(&meta, &Options::default()) {
            Err(CompileError::Semantic(errors)) => errors,
            other => panic!("unexpected result: {:?}", other),
        };
        assert!(matches!(
            &errors.0[0].kind,
            SemanticError::Resolve(ResolveError::Redefined(name)) if name == "x"
        ));
        assert!(errors
            .iter()
            .any(|error| matches!(error.kind, SemanticError::Type(_))));
    }

    #[test]
    fn undeclared_variable_is_reported_once() {
        let meta = SourceMetadata::new("fn main(): i64 = y;");
        let errors = match compile(&meta, &Options::default()) {
            Err(CompileError::Semantic(errors)) => errors,
            other => panic!("unexpected result: {:?}", other),
        };
        let kinds: Vec<_> = errors.iter().map(|error| error.kind.to_string()).collect();
        assert_eq!(kinds, vec!["variable \"y\" is not declared".to_string()]);
    }

    #[test]
    fn backend_names() {
        assert_eq!("qbe".parse::<Backend>(), Ok(Backend::Qbe));
        assert_eq!("amd64".parse::<Backend>(), Ok(Backend::Amd64));
        assert!("arm".parse::<Backend>().is_err());
    }

    #[test]
    fn text_only_build_writes_to_output() {
        let directory = std::env::temp_dir().join(format!("ttc-build-{}", std::process::id()));
        fs::create_dir_all(&directory).unwrap();
        let output = directory.join("out.asm");
        let meta = SourceMetadata::new("fn main(): i64 = 1;");
        let path = build(
            &meta,
            &BuildOptions {
                input: directory.join("prog.tt"),
                output: Some(output.clone()),
                assemble_only: true,
                compile: Options::default(),
            },
        )
        .unwrap();
        assert_eq!(path, output);
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("  mov rax, 1\n"));
        fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn outputs_never_replace_the_input() {
        let build_options = |input: &str, assemble_only: bool| BuildOptions {
            input: PathBuf::from(input),
            output: None,
            assemble_only,
            compile: Options::default(),
        };
        assert_eq!(build_options("prog", false).executable_path(), PathBuf::from("prog.out"));
        assert_eq!(build_options("prog.tt", false).executable_path(), PathBuf::from("prog"));

        let meta = SourceMetadata::new("fn main(): i64 = 1;");
        let result = build(&meta, &build_options("prog.asm", true));
        assert!(matches!(result, Err(BuildError::OverwritesInput(path)) if path == Path::new("prog.asm")));
    }
}
