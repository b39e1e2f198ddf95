//! Instructions generated at bundle-resolution time.
//!
//! Some instructions cannot be written as static patterns (their layout
//! depends on bundle variables or on fetched state). The orchestrator
//! registers an [`InstructionGenerator`] for them; bundle resolution calls it
//! after every bundle variable has been bound.

use std::fmt;
use std::sync::Arc;

use chain_sol::Instruction;

use crate::error::Result;
use crate::symbols::SymbolTable;

pub trait InstructionGenerator: Send + Sync {
    fn generate(&self, symbols: &SymbolTable) -> Result<Vec<Instruction>>;
}

impl<F> InstructionGenerator for F
where
    F: Fn(&SymbolTable) -> Result<Vec<Instruction>> + Send + Sync,
{
    fn generate(&self, symbols: &SymbolTable) -> Result<Vec<Instruction>> {
        self(symbols)
    }
}

#[derive(Clone)]
pub struct DynamicInstructionHandle {
    label: String,
    generator: Arc<dyn InstructionGenerator>,
}

impl DynamicInstructionHandle {
    pub fn new(label: impl Into<String>, generator: Arc<dyn InstructionGenerator>) -> Self {
        DynamicInstructionHandle {
            label: label.into(),
            generator,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Produce this handle's instructions against the current symbols.
    pub fn extend(&self, symbols: &SymbolTable, out: &mut Vec<Instruction>) -> Result<usize> {
        let generated = self.generator.generate(symbols)?;
        let count = generated.len();
        out.extend(generated);
        Ok(count)
    }
}

impl PartialEq for DynamicInstructionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && Arc::ptr_eq(&self.generator, &other.generator)
    }
}

impl fmt::Debug for DynamicInstructionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicInstructionHandle")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;
    use chain_sol::Address;

    #[test]
    fn closure_generator_sees_current_symbols() {
        let handle = DynamicInstructionHandle::new(
            "memo",
            Arc::new(|symbols: &SymbolTable| -> Result<Vec<Instruction>> {
                let n = match symbols.lookup("count")? {
                    TypedValue::U8(n) => *n,
                    _ => 0,
                };
                Ok((0..n)
                    .map(|i| Instruction::new(Address::new([i; 32]), vec![], vec![i]))
                    .collect())
            }),
        );

        let mut symbols = SymbolTable::new();
        symbols.set("count", TypedValue::U8(3));

        let mut out = Vec::new();
        assert_eq!(handle.extend(&symbols, &mut out).unwrap(), 3);
        assert_eq!(out[2].data, vec![2]);
    }

    #[test]
    fn generator_errors_propagate() {
        let handle = DynamicInstructionHandle::new(
            "needs_var",
            Arc::new(|symbols: &SymbolTable| -> Result<Vec<Instruction>> {
                symbols.lookup("missing")?;
                Ok(vec![])
            }),
        );
        let mut out = Vec::new();
        assert!(handle.extend(&SymbolTable::new(), &mut out).is_err());
        assert!(out.is_empty());
    }
}
