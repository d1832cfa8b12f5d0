//! Lipid shorthand names and the structural refinement of lipid annotations.
//!
//! Lipid library entries are named with the shorthand notation, e.g. `PC 16:0_18:1`
//! (chains resolved, unpositioned), `PC 16:0/18:1(9Z)` (positioned, with double bond
//! positions) or `TG O-52:2` (sum composition of an ether lipid). How much of that
//! structure is actually supported by a spectrum depends on which diagnostic fragments
//! were matched, so the name reported for a match is cut back to the deepest level
//! the evidence supports.
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::result::MatchResult;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LipidNameError {
    #[error("The lipid name is empty")]
    Empty,
    #[error("The lipid name {0:?} has no acyl chain description")]
    MissingChains(String),
    #[error("Could not parse acyl chain {0:?}")]
    InvalidChain(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainLinkage {
    Acyl,
    /// Alkyl ether, `O-`
    Ether,
    /// Alkenyl ether, `P-`
    Plasmalogen,
}

impl ChainLinkage {
    fn prefix(&self) -> &'static str {
        match self {
            ChainLinkage::Acyl => "",
            ChainLinkage::Ether => "O-",
            ChainLinkage::Plasmalogen => "P-",
        }
    }
}

/// One acyl chain, or a sum composition over several chains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipidChain {
    pub linkage: ChainLinkage,
    pub carbons: u32,
    pub double_bonds: u32,
    /// Double bond positions and geometry as written, e.g. `9Z`
    pub double_bond_positions: Vec<String>,
    /// Any modification written after `;`, e.g. `O2`
    pub modification: Option<String>,
}

impl LipidChain {
    pub fn parse(text: &str) -> Result<Self, LipidNameError> {
        let invalid = || LipidNameError::InvalidChain(text.to_string());
        let (linkage, rest) = if let Some(rest) = text.strip_prefix("O-") {
            (ChainLinkage::Ether, rest)
        } else if let Some(rest) = text.strip_prefix("P-") {
            (ChainLinkage::Plasmalogen, rest)
        } else {
            (ChainLinkage::Acyl, text)
        };

        let (rest, double_bond_positions) = match rest.find('(') {
            Some(i) => {
                let inner = rest[i + 1..].strip_suffix(')').ok_or_else(invalid)?;
                let positions = inner
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (&rest[..i], positions)
            }
            None => (rest, Vec::new()),
        };

        let (rest, modification) = match rest.split_once(';') {
            Some((rest, modification)) => (rest, Some(modification.to_string())),
            None => (rest, None),
        };

        let (carbons, double_bonds) = rest.split_once(':').ok_or_else(invalid)?;
        let carbons = carbons.parse::<u32>().map_err(|_| invalid())?;
        let double_bonds = double_bonds.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            linkage,
            carbons,
            double_bonds,
            double_bond_positions,
            modification,
        })
    }

    fn write_composition(&self, f: &mut impl std::fmt::Write) -> std::fmt::Result {
        write!(
            f,
            "{}{}:{}",
            self.linkage.prefix(),
            self.carbons,
            self.double_bonds
        )?;
        if let Some(m) = self.modification.as_ref() {
            write!(f, ";{m}")?;
        }
        Ok(())
    }
}

impl Display for LipidChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_composition(f)?;
        if !self.double_bond_positions.is_empty() {
            write!(f, "({})", self.double_bond_positions.join(","))?;
        }
        Ok(())
    }
}

/// A parsed lipid shorthand name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipidStructure {
    pub name: String,
    pub class: String,
    pub chains: Vec<LipidChain>,
    /// Whether the chains are written with `/`, fixing their sn-positions
    pub is_positioned: bool,
}

impl LipidStructure {
    pub fn parse(name: &str) -> Result<Self, LipidNameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LipidNameError::Empty);
        }
        let (class, chains) = name
            .split_once(' ')
            .ok_or_else(|| LipidNameError::MissingChains(name.to_string()))?;
        let chains = chains.trim();
        if chains.is_empty() {
            return Err(LipidNameError::MissingChains(name.to_string()));
        }
        let is_positioned = chains.contains('/');
        let chains = chains
            .split(['_', '/'])
            .map(LipidChain::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: name.to_string(),
            class: class.to_string(),
            chains,
            is_positioned,
        })
    }

    /// Whether the individual chains are known, rather than only their sum
    pub fn has_resolved_chains(&self) -> bool {
        self.chains.len() > 1
    }

    pub fn has_double_bond_positions(&self) -> bool {
        self.chains.iter().any(|c| !c.double_bond_positions.is_empty())
    }

    pub fn sum_composition(&self) -> LipidChain {
        let linkage = self
            .chains
            .iter()
            .map(|c| c.linkage)
            .find(|l| *l != ChainLinkage::Acyl)
            .unwrap_or(ChainLinkage::Acyl);
        let modification = self.chains.iter().find_map(|c| c.modification.clone());
        LipidChain {
            linkage,
            carbons: self.chains.iter().map(|c| c.carbons).sum(),
            double_bonds: self.chains.iter().map(|c| c.double_bonds).sum(),
            double_bond_positions: Vec::new(),
            modification,
        }
    }

    /// `PC 34:1`
    pub fn sum_composition_name(&self) -> String {
        let mut name = format!("{} ", self.class);
        let _ = self.sum_composition().write_composition(&mut name);
        name
    }

    fn chain_level_name(&self, separator: char) -> String {
        if !self.has_resolved_chains() {
            return self.sum_composition_name();
        }
        let mut name = format!("{} ", self.class);
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                name.push(separator);
            }
            let _ = chain.write_composition(&mut name);
        }
        name
    }

    /// `PC 16:0_18:1`
    pub fn chains_name(&self) -> String {
        self.chain_level_name('_')
    }

    /// `PC 16:0/18:1`, or the chain level name when positions are not known
    pub fn position_name(&self) -> String {
        if self.is_positioned {
            self.chain_level_name('/')
        } else {
            self.chains_name()
        }
    }
}

/// A session-owned memo of parsed lipid names, safe to share between threads.
///
/// Names that fail to parse are remembered as well, so each distinct name is parsed
/// at most once per cache.
#[derive(Debug, Default)]
pub struct LipidNameCache {
    entries: RwLock<HashMap<String, Option<Arc<LipidStructure>>>>,
}

impl LipidNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse(&self, name: &str) -> Option<Arc<LipidStructure>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = entries.get(name) {
                return hit.clone();
            }
        }
        let parsed = match LipidStructure::parse(name) {
            Ok(structure) => Some(Arc::new(structure)),
            Err(e) => {
                tracing::trace!("Failed to parse lipid name {name:?}: {e}");
                None
            }
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(name.to_string()).or_insert(parsed).clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// The structural level a diagnostic fragment is evidence for, read from the leading
/// word of a reference peak's comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FragmentEvidence {
    Class,
    Chain,
    Position,
    DoubleBondPosition,
}

impl FragmentEvidence {
    pub fn from_comment(comment: &str) -> Option<Self> {
        let tag = comment
            .split(|c: char| c == ':' || c.is_whitespace())
            .next()?
            .to_ascii_lowercase();
        match tag.as_str() {
            "class" | "headgroup" => Some(Self::Class),
            "chain" | "acyl" => Some(Self::Chain),
            "position" | "sn" => Some(Self::Position),
            "db" => Some(Self::DoubleBondPosition),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct EvidenceSet {
    class: bool,
    chain: bool,
    position: bool,
    double_bond: bool,
}

impl EvidenceSet {
    fn from_annotations<S: AsRef<str>>(annotations: &[S]) -> Self {
        let mut evidence = Self::default();
        for ev in annotations
            .iter()
            .filter_map(|a| FragmentEvidence::from_comment(a.as_ref()))
        {
            match ev {
                FragmentEvidence::Class => evidence.class = true,
                FragmentEvidence::Chain => evidence.chain = true,
                FragmentEvidence::Position => evidence.position = true,
                FragmentEvidence::DoubleBondPosition => evidence.double_bond = true,
            }
        }
        evidence
    }
}

/// Drop every lipid structure flag of `result` and restore the reference name
pub fn clear_lipid_annotation(result: &mut MatchResult, reference_name: &str) {
    result.is_lipid_class_match = false;
    result.is_lipid_chains_match = false;
    result.is_lipid_position_match = false;
    result.is_lipid_double_bond_position_match = false;
    result.is_other_lipid_match = false;
    result.name = reference_name.to_string();
}

/// Whether `name` is `reference_name` or one of the names refinement can rewrite it to
pub fn is_refinement_of(name: &str, reference_name: &str, cache: &LipidNameCache) -> bool {
    if name == reference_name {
        return true;
    }
    cache.get_or_parse(reference_name).is_some_and(|structure| {
        name == structure.position_name()
            || name == structure.chains_name()
            || name == structure.sum_composition_name()
    })
}

/// Set the lipid structure flags of `result` from the matched diagnostic fragments
/// and rewrite its name to the deepest supported level.
///
/// The name is always derived from `reference_name`, so refining the same result
/// twice gives the same name. Names that cannot be parsed mark the result as an
/// "other lipid" match and are kept verbatim. `is_spectrum_match` is never touched.
pub fn refine_lipid_annotation<S: AsRef<str>>(
    result: &mut MatchResult,
    reference_name: &str,
    matched_annotations: &[S],
    cache: &LipidNameCache,
) {
    clear_lipid_annotation(result, reference_name);

    let Some(structure) = cache.get_or_parse(reference_name) else {
        result.is_other_lipid_match = true;
        result.name = reference_name.to_string();
        return;
    };

    let evidence = EvidenceSet::from_annotations(matched_annotations);
    result.is_lipid_class_match = evidence.class;
    result.is_lipid_chains_match =
        result.is_lipid_class_match && evidence.chain && structure.has_resolved_chains();
    result.is_lipid_position_match =
        result.is_lipid_chains_match && evidence.position && structure.is_positioned;
    result.is_lipid_double_bond_position_match = result.is_lipid_position_match
        && evidence.double_bond
        && structure.has_double_bond_positions();

    result.name = if result.is_lipid_double_bond_position_match {
        structure.name.clone()
    } else if result.is_lipid_position_match {
        structure.position_name()
    } else if result.is_lipid_chains_match {
        structure.chains_name()
    } else if result.is_lipid_class_match {
        structure.sum_composition_name()
    } else {
        reference_name.to_string()
    };
}
