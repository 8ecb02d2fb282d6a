use super::assembly::Instruction;
use std::collections::VecDeque;
use std::fmt;

/// Growable instruction sequence the passes build their output with
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AssemblyOutput(pub VecDeque<Instruction>);

impl AssemblyOutput {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn push_back(&mut self, value: impl Into<Instruction>) -> &mut Self {
        self.0.push_back(value.into());
        self
    }

    pub fn chain_one(mut self, value: impl Into<Instruction>) -> Self {
        self.push_back(value);
        self
    }

    pub fn chain<T>(mut self, values: impl IntoIterator<Item = T>) -> Self
    where
        T: Into<Instruction>,
    {
        self.extend(values);
        self
    }

    pub fn extend<T>(&mut self, values: impl IntoIterator<Item = T>) -> &mut Self
    where
        T: Into<Instruction>,
    {
        self.0.extend(values.into_iter().map(T::into));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instruction> {
        self.0.iter_mut()
    }
}

impl IntoIterator for AssemblyOutput {
    type Item = Instruction;
    type IntoIter = <VecDeque<Instruction> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Instruction> for AssemblyOutput {
    fn from(item: Instruction) -> Self {
        Self::new().chain_one(item)
    }
}

impl FromIterator<AssemblyOutput> for AssemblyOutput {
    fn from_iter<T: IntoIterator<Item = AssemblyOutput>>(iter: T) -> Self {
        iter.into_iter()
            .fold(AssemblyOutput::new(), AssemblyOutput::chain)
    }
}

impl FromIterator<Instruction> for AssemblyOutput {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Self(VecDeque::from_iter(iter))
    }
}

impl fmt::Debug for AssemblyOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        struct DoDisplay<'a>(&'a Instruction);

        impl fmt::Debug for DoDisplay<'_> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        f.debug_list()
            .entries(self.0.iter().map(DoDisplay))
            .finish()
    }
}
