//! Step-by-step flows: the deal guide and asset creation.
//!
//! Both wizards are plain state machines. Each transition checks the
//! current step and the data it needs, and fails with
//! [`CatalogError::Invalid`] instead of moving on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bucket::{bucketize, RecommendationBuckets, Stage};
use crate::error::CatalogError;
use crate::models::{Asset, AssetCategory, AssetDraft, AssetType, Confidentiality};
use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DealType {
    NewLogo,
    Expansion,
    Renewal,
    Services,
}

impl DealType {
    pub const ALL: [DealType; 4] = [
        DealType::NewLogo,
        DealType::Expansion,
        DealType::Renewal,
        DealType::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::NewLogo => "new-logo",
            DealType::Expansion => "expansion",
            DealType::Renewal => "renewal",
            DealType::Services => "services",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DealType::NewLogo => "New License / Logo",
            DealType::Expansion => "Expansion / Upsell",
            DealType::Renewal => "Renewal",
            DealType::Services => "Services / Consulting",
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DealType::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s) || d.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CatalogError::Invalid(format!(
                    "unknown deal type '{}': expected new-logo, expansion, renewal, or services",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideStep {
    Context,
    Technology,
    Results,
}

/// What the deal guide hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideResult {
    pub deal_type: DealType,
    /// The stage the deal is in. Its bucket is the one to lead with.
    pub stage: Stage,
    pub offerings: Vec<String>,
    pub technologies: Vec<String>,
    pub buckets: RecommendationBuckets,
}

impl GuideResult {
    pub fn focus(&self) -> &[Asset] {
        self.buckets.get(self.stage)
    }
}

/// Context (deal type, stage) → Technology (offerings, technologies) →
/// Results.
#[derive(Debug, Clone)]
pub struct DealGuide {
    step: GuideStep,
    pub deal_type: Option<DealType>,
    pub stage: Option<Stage>,
    pub offerings: Vec<String>,
    pub technologies: Vec<String>,
    result: Option<GuideResult>,
}

impl Default for DealGuide {
    fn default() -> Self {
        Self::new()
    }
}

impl DealGuide {
    pub fn new() -> Self {
        Self {
            step: GuideStep::Context,
            deal_type: None,
            stage: None,
            offerings: Vec::new(),
            technologies: Vec::new(),
            result: None,
        }
    }

    pub fn step(&self) -> GuideStep {
        self.step
    }

    pub fn result(&self) -> Option<&GuideResult> {
        self.result.as_ref()
    }

    /// Context → Technology once deal type and stage are set.
    pub fn advance(&mut self) -> Result<GuideStep, CatalogError> {
        match self.step {
            GuideStep::Context => {
                if self.deal_type.is_none() || self.stage.is_none() {
                    return Err(CatalogError::Invalid(
                        "choose a deal type and the current sales stage".into(),
                    ));
                }
                self.step = GuideStep::Technology;
                Ok(self.step)
            }
            GuideStep::Technology => Err(CatalogError::Invalid(
                "generate recommendations to see results".into(),
            )),
            GuideStep::Results => Err(CatalogError::Invalid("the guide is complete".into())),
        }
    }

    /// Buckets `assets` with the chosen offerings and technologies and
    /// moves to Results.
    pub fn recommend(&mut self, assets: &[Asset]) -> Result<&GuideResult, CatalogError> {
        if self.step != GuideStep::Technology {
            return Err(CatalogError::Invalid(
                "recommendations need the context step completed first".into(),
            ));
        }
        let (Some(deal_type), Some(stage)) = (self.deal_type, self.stage) else {
            return Err(CatalogError::Invalid(
                "choose a deal type and the current sales stage".into(),
            ));
        };
        if self.offerings.iter().all(|o| o.trim().is_empty()) {
            return Err(CatalogError::Invalid("choose at least one offering".into()));
        }

        let buckets = bucketize(assets, &self.offerings, &self.technologies);
        self.step = GuideStep::Results;
        Ok(self.result.insert(GuideResult {
            deal_type,
            stage,
            offerings: self.offerings.clone(),
            technologies: self.technologies.clone(),
            buckets,
        }))
    }

    pub fn back(&mut self) -> GuideStep {
        self.step = match self.step {
            GuideStep::Context | GuideStep::Technology => GuideStep::Context,
            GuideStep::Results => {
                self.result = None;
                GuideStep::Technology
            }
        };
        self.step
    }

    pub fn restart(&mut self) {
        *self = Self::new();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateStep {
    Category,
    Type,
    Details,
    Done,
}

/// Types offered once a category is picked.
pub fn types_for(category: AssetCategory) -> &'static [AssetType] {
    match category {
        AssetCategory::Technical => &[AssetType::Play, AssetType::CodeRef, AssetType::Template],
        AssetCategory::Sales => &[AssetType::WinStory, AssetType::Template],
    }
}

/// Category → Type → Details → Done.
#[derive(Debug, Clone)]
pub struct CreateWizard {
    step: CreateStep,
    category: Option<AssetCategory>,
    asset_type: Option<AssetType>,
    default_owners: Vec<String>,
    pub draft: AssetDraft,
    pub content: String,
    saved_id: Option<String>,
}

impl CreateWizard {
    pub fn new(default_owners: Vec<String>) -> Self {
        Self {
            step: CreateStep::Category,
            category: None,
            asset_type: None,
            default_owners,
            draft: AssetDraft::default(),
            content: String::new(),
            saved_id: None,
        }
    }

    /// Starts directly at Details for `asset_type`, inferring the category.
    pub fn quick_add(asset_type: AssetType, default_owners: Vec<String>) -> Self {
        let mut wizard = Self::new(default_owners);
        wizard.category = Some(asset_type.default_category());
        wizard.seed_draft(asset_type);
        wizard
    }

    pub fn step(&self) -> CreateStep {
        self.step
    }

    pub fn category(&self) -> Option<AssetCategory> {
        self.category
    }

    pub fn asset_type(&self) -> Option<AssetType> {
        self.asset_type
    }

    pub fn saved_id(&self) -> Option<&str> {
        self.saved_id.as_deref()
    }

    pub fn choose_category(&mut self, category: AssetCategory) -> Result<CreateStep, CatalogError> {
        self.expect(CreateStep::Category)?;
        self.category = Some(category);
        self.step = CreateStep::Type;
        Ok(self.step)
    }

    pub fn choose_type(&mut self, asset_type: AssetType) -> Result<CreateStep, CatalogError> {
        self.expect(CreateStep::Type)?;
        let category = self
            .category
            .ok_or_else(|| CatalogError::Invalid("choose a category first".into()))?;
        if !types_for(category).contains(&asset_type) {
            return Err(CatalogError::Invalid(format!(
                "{} is not offered for {} assets",
                asset_type, category
            )));
        }
        self.seed_draft(asset_type);
        Ok(self.step)
    }

    fn seed_draft(&mut self, asset_type: AssetType) {
        self.asset_type = Some(asset_type);
        self.draft.asset_type = Some(asset_type);
        self.draft.category = self.category;
        self.draft.confidentiality = Some(Confidentiality::InternalOnly);
        self.draft.owners = Some(self.default_owners.clone());
        self.step = CreateStep::Details;
    }

    /// Validates the draft against its type's schema and returns what
    /// should be persisted: the draft and the markdown body, if any.
    pub fn submit(
        &self,
        schemas: &SchemaRegistry,
    ) -> Result<(AssetDraft, Option<String>), CatalogError> {
        self.expect(CreateStep::Details)?;
        schemas.validate(&self.draft)?;
        let content = (!self.content.trim().is_empty()).then(|| self.content.clone());
        Ok((self.draft.clone(), content))
    }

    /// Records the id the backend assigned and finishes.
    pub fn complete(&mut self, id: impl Into<String>) -> Result<CreateStep, CatalogError> {
        self.expect(CreateStep::Details)?;
        self.saved_id = Some(id.into());
        self.step = CreateStep::Done;
        Ok(self.step)
    }

    pub fn back(&mut self) -> CreateStep {
        self.step = match self.step {
            CreateStep::Category | CreateStep::Type => CreateStep::Category,
            CreateStep::Details => CreateStep::Type,
            CreateStep::Done => CreateStep::Done,
        };
        self.step
    }

    fn expect(&self, step: CreateStep) -> Result<(), CatalogError> {
        if self.step == step {
            Ok(())
        } else {
            Err(CatalogError::Invalid(format!(
                "wizard is at {:?}, expected {:?}",
                self.step, step
            )))
        }
    }
}
