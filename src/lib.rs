pub mod asmgen;
pub mod ast;
pub mod driver;
pub mod error;
pub mod grammar;
pub mod ir;
pub mod qbe;
pub mod resolve;
pub mod tast;
pub mod typechecker;
pub mod types;
