use std::fmt;

/// The context a pattern is resolved under. The same string resolves
/// differently depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionContext {
    AccountDeclaration,
    PdaSeed,
    AddressResolution,
    DataResolution,
    MetaResolution,
    VariableResolution,
    AccountDecoderDeclaration,
    DynamicInstructionDeclaration,
    TestWalletDeclaration,
    InstructionResolution,
    InstructionBundleResolution,
    DeclarationSyntax,
    Literal,
}

impl ResolutionContext {
    pub const ALL: [ResolutionContext; 13] = [
        ResolutionContext::AccountDeclaration,
        ResolutionContext::PdaSeed,
        ResolutionContext::AddressResolution,
        ResolutionContext::DataResolution,
        ResolutionContext::MetaResolution,
        ResolutionContext::VariableResolution,
        ResolutionContext::AccountDecoderDeclaration,
        ResolutionContext::DynamicInstructionDeclaration,
        ResolutionContext::TestWalletDeclaration,
        ResolutionContext::InstructionResolution,
        ResolutionContext::InstructionBundleResolution,
        ResolutionContext::DeclarationSyntax,
        ResolutionContext::Literal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ResolutionContext::AccountDeclaration => "account declaration",
            ResolutionContext::PdaSeed => "pda seed",
            ResolutionContext::AddressResolution => "address",
            ResolutionContext::DataResolution => "instruction data",
            ResolutionContext::MetaResolution => "account meta",
            ResolutionContext::VariableResolution => "variable",
            ResolutionContext::AccountDecoderDeclaration => "account decoder field",
            ResolutionContext::DynamicInstructionDeclaration => "dynamic instruction",
            ResolutionContext::TestWalletDeclaration => "test wallet",
            ResolutionContext::InstructionResolution => "instruction",
            ResolutionContext::InstructionBundleResolution => "instruction bundle",
            ResolutionContext::DeclarationSyntax => "declaration",
            ResolutionContext::Literal => "literal",
        }
    }
}

impl fmt::Display for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
