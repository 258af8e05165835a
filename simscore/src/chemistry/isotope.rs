use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimsError};

/// Elements with supported isotope systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Oxygen,
    Sulphur,
    Carbon,
    Chlorine,
}

impl Element {
    pub const ALL: [Element; 4] = [Element::Oxygen, Element::Sulphur, Element::Carbon, Element::Chlorine];

    /// Returns the measurable species of this element, major isotope first.
    pub fn isotopes(&self) -> &'static [Isotope] {
        match self {
            Element::Oxygen => &[Isotope::O16, Isotope::O17, Isotope::O18, Isotope::O16H1],
            Element::Sulphur => &[Isotope::S32, Isotope::S33, Isotope::S34, Isotope::S36, Isotope::S32H1],
            Element::Carbon => &[Isotope::C12, Isotope::C13, Isotope::C12H1],
            Element::Chlorine => &[Isotope::Cl35, Isotope::Cl37],
        }
    }

    /// Returns the name of the international delta standard for this element.
    pub fn default_delta_standard(&self) -> &'static str {
        match self {
            Element::Oxygen => "VSMOW",
            Element::Sulphur => "VCDT",
            Element::Carbon => "VPDB",
            Element::Chlorine => "SMOC",
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Element::Oxygen => write!(f, "Oxygen"),
            Element::Sulphur => write!(f, "Sulphur"),
            Element::Carbon => write!(f, "Carbon"),
            Element::Chlorine => write!(f, "Chlorine"),
        }
    }
}

impl FromStr for Element {
    type Err = SimsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o" | "oxygen" => Ok(Element::Oxygen),
            "s" | "sulphur" | "sulfur" => Ok(Element::Sulphur),
            "c" | "carbon" => Ok(Element::Carbon),
            "cl" | "chlorine" => Ok(Element::Chlorine),
            other => Err(SimsError::precondition(format!("unrecognised element '{other}'"))),
        }
    }
}

/// A measured secondary-ion species: an isotope or one of its hydrides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Isotope {
    #[serde(rename = "16O")]
    O16,
    #[serde(rename = "17O")]
    O17,
    #[serde(rename = "18O")]
    O18,
    #[serde(rename = "16O1H")]
    O16H1,
    #[serde(rename = "32S")]
    S32,
    #[serde(rename = "33S")]
    S33,
    #[serde(rename = "34S")]
    S34,
    #[serde(rename = "36S")]
    S36,
    #[serde(rename = "32S1H")]
    S32H1,
    #[serde(rename = "12C")]
    C12,
    #[serde(rename = "13C")]
    C13,
    #[serde(rename = "12C1H")]
    C12H1,
    #[serde(rename = "35Cl")]
    Cl35,
    #[serde(rename = "37Cl")]
    Cl37,
}

impl Isotope {
    pub fn element(&self) -> Element {
        match self {
            Isotope::O16 | Isotope::O17 | Isotope::O18 | Isotope::O16H1 => Element::Oxygen,
            Isotope::S32 | Isotope::S33 | Isotope::S34 | Isotope::S36 | Isotope::S32H1 => Element::Sulphur,
            Isotope::C12 | Isotope::C13 | Isotope::C12H1 => Element::Carbon,
            Isotope::Cl35 | Isotope::Cl37 => Element::Chlorine,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Isotope::O16 => "16O",
            Isotope::O17 => "17O",
            Isotope::O18 => "18O",
            Isotope::O16H1 => "16O1H",
            Isotope::S32 => "32S",
            Isotope::S33 => "33S",
            Isotope::S34 => "34S",
            Isotope::S36 => "36S",
            Isotope::S32H1 => "32S1H",
            Isotope::C12 => "12C",
            Isotope::C13 => "13C",
            Isotope::C12H1 => "12C1H",
            Isotope::Cl35 => "35Cl",
            Isotope::Cl37 => "37Cl",
        }
    }

    pub fn is_hydride(&self) -> bool {
        matches!(self, Isotope::O16H1 | Isotope::S32H1 | Isotope::C12H1)
    }

    /// Whether the species counts towards the secondary-ion yield of a spot.
    pub fn in_yield_sum(&self) -> bool {
        !self.is_hydride()
    }
}

impl Display for Isotope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Isotope {
    type Err = SimsError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Element::ALL
            .iter()
            .flat_map(|element| element.isotopes().iter())
            .find(|isotope| isotope.label() == s)
            .copied()
            .ok_or_else(|| SimsError::precondition(format!("unrecognised isotope '{s}'")))
    }
}

/// An isotope ratio, numerator over denominator.
///
/// Whether a delta value exists for the ratio is decided once, at construction:
/// ratios involving a hydride have no accepted standard value and stay in ratio space
/// for the whole reduction. Equality, ordering and hashing only look at the isotope pair.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ratio {
    numerator: Isotope,
    denominator: Isotope,
    has_delta: bool,
}

impl Ratio {
    /// Creates a ratio, validating that both species belong to the same element.
    ///
    /// # Examples
    ///
    /// ```
    /// use simscore::{Isotope, Ratio};
    ///
    /// let ratio = Ratio::new(Isotope::S34, Isotope::S32).unwrap();
    /// assert_eq!(ratio.label(), "34S/32S");
    /// assert!(ratio.has_delta());
    /// ```
    pub fn new(numerator: Isotope, denominator: Isotope) -> Result<Self> {
        if numerator == denominator {
            return Err(SimsError::input(format!("ratio of {numerator} to itself")));
        }
        if numerator.element() != denominator.element() {
            return Err(SimsError::input(format!(
                "ratio {numerator}/{denominator} mixes {} and {}",
                numerator.element(),
                denominator.element()
            )));
        }
        Ok(Ratio::of(numerator, denominator))
    }

    // callers guarantee a valid pair
    pub(crate) fn of(numerator: Isotope, denominator: Isotope) -> Self {
        Ratio {
            numerator,
            denominator,
            has_delta: !numerator.is_hydride() && !denominator.is_hydride(),
        }
    }

    /// Parses a label of the form `34S/32S`.
    pub fn parse(label: &str) -> Result<Self> {
        let (numerator, denominator) = label
            .split_once('/')
            .ok_or_else(|| SimsError::input(format!("ratio label '{label}' is not of the form a/b")))?;
        Ratio::new(numerator.parse()?, denominator.parse()?)
    }

    pub fn numerator(&self) -> Isotope {
        self.numerator
    }

    pub fn denominator(&self) -> Isotope {
        self.denominator
    }

    pub fn has_delta(&self) -> bool {
        self.has_delta
    }

    pub fn element(&self) -> Element {
        self.numerator.element()
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.numerator, self.denominator)
    }

    /// Minor-isotope ratio that additionally gets a time + time² drift fit.
    pub fn has_curvilinear_diagnostic(&self) -> bool {
        matches!(
            (self.numerator, self.denominator),
            (Isotope::S33, Isotope::S32) | (Isotope::O17, Isotope::O16)
        )
    }

    fn key(&self) -> (Isotope, Isotope) {
        (self.numerator, self.denominator)
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Ratio {}

impl Hash for Ratio {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Display for Ratio {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Ratio {
    type Err = SimsError;

    fn from_str(s: &str) -> Result<Self> {
        Ratio::parse(s)
    }
}

impl TryFrom<String> for Ratio {
    type Error = SimsError;

    fn try_from(value: String) -> Result<Self> {
        Ratio::parse(&value)
    }
}

impl From<Ratio> for String {
    fn from(ratio: Ratio) -> Self {
        ratio.label()
    }
}

/// An ordered list of ratios measured together, plus the species they reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Ratio>", into = "Vec<Ratio>")]
pub struct Method {
    element: Element,
    ratios: Vec<Ratio>,
    isotopes: Vec<Isotope>,
}

const CATALOGUE: &[(Element, &[(Isotope, Isotope)])] = &[
    (Element::Oxygen, &[(Isotope::O18, Isotope::O16)]),
    (Element::Oxygen, &[(Isotope::O18, Isotope::O16), (Isotope::O16H1, Isotope::O16)]),
    (Element::Oxygen, &[(Isotope::O18, Isotope::O16), (Isotope::O17, Isotope::O16)]),
    (Element::Oxygen, &[(Isotope::O18, Isotope::O16), (Isotope::O17, Isotope::O16), (Isotope::O16H1, Isotope::O16)]),
    (Element::Sulphur, &[(Isotope::S34, Isotope::S32)]),
    (Element::Sulphur, &[(Isotope::S34, Isotope::S32), (Isotope::S32H1, Isotope::S32)]),
    (Element::Sulphur, &[(Isotope::S34, Isotope::S32), (Isotope::S33, Isotope::S32)]),
    (Element::Sulphur, &[(Isotope::S34, Isotope::S32), (Isotope::S33, Isotope::S32), (Isotope::S36, Isotope::S32)]),
    (Element::Sulphur, &[(Isotope::S34, Isotope::S32), (Isotope::S33, Isotope::S32), (Isotope::S32H1, Isotope::S32)]),
    (Element::Carbon, &[(Isotope::C13, Isotope::C12)]),
    (Element::Carbon, &[(Isotope::C13, Isotope::C12), (Isotope::C12H1, Isotope::C12)]),
    (Element::Chlorine, &[(Isotope::Cl37, Isotope::Cl35)]),
];

impl Method {
    /// Creates a method from an ordered list of ratios.
    ///
    /// The ratio set must be one of the supported combinations of `Method::catalogue`.
    pub fn new(ratios: Vec<Ratio>) -> Result<Self> {
        let first = ratios.first().ok_or_else(|| SimsError::input("method without ratios"))?;
        let element = first.element();

        if let Some(stray) = ratios.iter().find(|r| r.element() != element) {
            return Err(SimsError::input(format!("ratio {stray} does not belong to {element}")));
        }
        if !ratios.iter().all_unique() {
            return Err(SimsError::input("method lists a ratio twice"));
        }

        let supported = Method::catalogue(element)
            .iter()
            .any(|m| m.ratios.len() == ratios.len() && ratios.iter().all(|r| m.ratios.contains(r)));
        if !supported {
            return Err(SimsError::precondition(format!(
                "unrecognised isotope combination [{}]",
                ratios.iter().join(", ")
            )));
        }

        Ok(Method::build(element, ratios))
    }

    /// Creates a method from labels like `["34S/32S", "33S/32S"]`.
    pub fn from_labels(labels: &[&str]) -> Result<Self> {
        let ratios = labels.iter().map(|l| Ratio::parse(l)).collect::<Result<Vec<_>>>()?;
        Method::new(ratios)
    }

    /// Supported isotope combinations of an element.
    pub fn catalogue(element: Element) -> Vec<Method> {
        CATALOGUE
            .iter()
            .filter(|(e, _)| *e == element)
            .map(|(e, pairs)| Method::build(*e, pairs.iter().map(|&(n, d)| Ratio::of(n, d)).collect()))
            .collect()
    }

    fn build(element: Element, ratios: Vec<Ratio>) -> Self {
        let isotopes = ratios
            .iter()
            .flat_map(|r| [r.numerator(), r.denominator()])
            .unique()
            .sorted()
            .collect();
        Method { element, ratios, isotopes }
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn ratios(&self) -> &[Ratio] {
        &self.ratios
    }

    pub fn isotopes(&self) -> &[Isotope] {
        &self.isotopes
    }

    pub fn contains(&self, ratio: &Ratio) -> bool {
        self.ratios.contains(ratio)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.element, self.ratios.iter().join(", "))
    }
}

impl TryFrom<Vec<Ratio>> for Method {
    type Error = SimsError;

    fn try_from(ratios: Vec<Ratio>) -> Result<Self> {
        Method::new(ratios)
    }
}

impl From<Method> for Vec<Ratio> {
    fn from(method: Method) -> Self {
        method.ratios
    }
}
