use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::actor::TenantId;
use crate::domain::approval::{ApprovalRequest, ProjectId, ReferenceType, RequestState, SupplierId};
use crate::errors::ApprovalError;
use crate::store::StoreError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub states: Vec<RequestState>,
    #[serde(default)]
    pub reference_type: Option<ReferenceType>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub supplier_ids: Vec<SupplierId>,
}

impl ListFilter {
    /// Trimmed keyword, or `None` when absent or blank.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|keyword| !keyword.is_empty())
    }

    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        if let Some(project_id) = &self.project_id {
            if &request.project_id != project_id {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&request.state) {
            return false;
        }
        if let Some(reference_type) = self.reference_type {
            if request.reference_type != reference_type {
                return false;
            }
        }
        if !self.supplier_ids.is_empty() {
            let Some(supplier_id) = request.supplier_id else {
                return false;
            };
            if !self.supplier_ids.contains(&supplier_id) {
                return false;
            }
        }
        if let Some(keyword) = self.keyword() {
            let keyword = keyword.to_lowercase();
            let in_name = request.name.to_lowercase().contains(&keyword);
            let in_purpose = request
                .purpose
                .as_deref()
                .map(|purpose| purpose.to_lowercase().contains(&keyword))
                .unwrap_or(false);
            if !in_name && !in_purpose {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self { default_page_size: DEFAULT_PAGE_SIZE, max_page_size: MAX_PAGE_SIZE }
    }
}

/// A validated 1-based page window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn resolve(
        page: Option<u32>,
        page_size: Option<u32>,
        limits: ListingLimits,
    ) -> Result<Self, ApprovalError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ApprovalError::Validation {
                field: "page",
                message: "page is 1-based and must be at least 1".to_string(),
            });
        }
        let page_size = page_size.unwrap_or(limits.default_page_size);
        if page_size == 0 {
            return Err(ApprovalError::Validation {
                field: "pageSize",
                message: "pageSize must be at least 1".to_string(),
            });
        }

        Ok(Self { page, page_size: page_size.min(limits.max_page_size) })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Slices an already filtered and ordered result set.
    pub fn from_ordered(all: Vec<T>, window: PageRequest) -> Self {
        let total_count = all.len() as u64;
        let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(offset).take(window.page_size as usize).collect();
        Self { items, total_count, page: window.page, page_size: window.page_size }
    }
}

/// Newest first, then id ascending.
pub fn listing_order(left: &ApprovalRequest, right: &ApprovalRequest) -> std::cmp::Ordering {
    right.created_at.cmp(&left.created_at).then_with(|| left.id.cmp(&right.id))
}

#[async_trait]
pub trait ListQuery: Send + Sync {
    async fn find_page(
        &self,
        tenant_id: &TenantId,
        filter: &ListFilter,
        window: PageRequest,
    ) -> Result<Page<ApprovalRequest>, StoreError>;
}
