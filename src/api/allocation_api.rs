// ==========================================
// 煤炭出口业务系统 - 分配 API
// ==========================================
// 职责: 分配建议、自动分配、批量分配、分配记录维护、状态查询
// 约定: 状态查询在实体不存在时返回 Ok(None)（供轮询小部件直接渲染空态）
// ==========================================

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::AllocationConfig;
use crate::domain::mapping::{MappingDetail, NewMapping, SupplyExportMapping};
use crate::domain::role::{project_for_role, Role};
use crate::engine::allocation::{AllocationEngine, AllocationResult, AutoAllocateRequest, SuggestionRequest, SuggestionSet};
use crate::engine::bulk::{BulkAllocationOrchestrator, BulkResult};
use crate::engine::mapping_ops::MappingCommands;
use crate::engine::repositories::AllocationRepositories;
use crate::engine::status::{ExportSourcingStatus, StatusReporter, SupplyStatus};
use crate::engine::validator::{BulkValidationReport, MappingValidator, ValidationResult};

/// 批量分配请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAllocateRequest {
    pub items: Vec<NewMapping>,
    #[serde(default = "default_validate_first")]
    pub validate_first: bool,
}

fn default_validate_first() -> bool {
    true
}

// ==========================================
// AllocationApi - 分配 API
// ==========================================

/// 分配API
///
/// 职责：
/// 1. 建议 / 自动分配（AllocationEngine）
/// 2. 批量分配（整批原子，瞬时失败重试一次）
/// 3. 单条分配记录的校验、新建、更新、删除
/// 4. 供货 / 出口状态与按角色裁剪的记录视图
pub struct AllocationApi {
    repos: AllocationRepositories,
    engine: Arc<AllocationEngine>,
    bulk: Arc<BulkAllocationOrchestrator>,
    commands: Arc<MappingCommands>,
    validator: Arc<MappingValidator>,
    status: Arc<StatusReporter>,
}

impl AllocationApi {
    /// 创建新的AllocationApi实例
    pub fn new(repos: AllocationRepositories, config: AllocationConfig) -> Self {
        Self {
            engine: Arc::new(AllocationEngine::new(repos.clone(), config)),
            bulk: Arc::new(BulkAllocationOrchestrator::new(repos.clone())),
            commands: Arc::new(MappingCommands::new(repos.clone())),
            validator: Arc::new(MappingValidator::new(repos.clone())),
            status: Arc::new(StatusReporter::new(repos.clone())),
            repos,
        }
    }

    pub fn config(&self) -> &AllocationConfig {
        self.engine.config()
    }

    // ==========================================
    // 建议 / 自动分配
    // ==========================================

    /// 生成分配建议
    ///
    /// # 返回
    /// - Ok(SuggestionSet): 建议集合（出口已备货完成时 fully_sourced=true）
    /// - Err(ApiError::NotFound): 出口批次不存在
    pub fn suggest_allocations(&self, request: &SuggestionRequest) -> ApiResult<SuggestionSet> {
        ensure_id("export_id", request.export_id)?;
        if request.max_suggestions == Some(0) {
            return Err(ApiError::InvalidInput("max_suggestions 必须大于 0".to_string()));
        }
        Ok(self.engine.suggest_allocations(request)?)
    }

    /// 自动分配（逐条独立提交，允许部分成功）
    pub fn auto_allocate(&self, request: &AutoAllocateRequest) -> ApiResult<AllocationResult> {
        ensure_id("export_id", request.export_id)?;
        Ok(self.engine.auto_allocate(request)?)
    }

    /// 批量分配（全有或全无）
    ///
    /// 锁竞争导致的瞬时失败等待 bulk_retry_backoff_ms 后重试一次；
    /// 第二次仍失败则返回错误。
    pub fn bulk_allocate(&self, request: &BulkAllocateRequest) -> ApiResult<BulkResult> {
        if request.items.is_empty() {
            return Err(ApiError::InvalidInput("批量分配列表不能为空".to_string()));
        }

        match self.bulk.bulk_allocate(&request.items, request.validate_first) {
            Err(err) if err.is_transient() => {
                let backoff_ms = self.config().bulk_retry_backoff_ms;
                warn!(error = %err, backoff_ms, "批量分配遇到瞬时失败，等待后重试一次");
                thread::sleep(Duration::from_millis(backoff_ms));
                Ok(self.bulk.bulk_allocate(&request.items, request.validate_first)?)
            }
            other => Ok(other?),
        }
    }

    // ==========================================
    // 状态查询
    // ==========================================

    /// 供货批次分配状态；批次不存在返回 Ok(None)
    pub fn supply_status(&self, supply_id: i64) -> ApiResult<Option<SupplyStatus>> {
        Ok(self.status.supply_status(supply_id)?)
    }

    /// 出口批次备货状态；批次不存在返回 Ok(None)
    pub fn export_status(&self, export_id: i64) -> ApiResult<Option<ExportSourcingStatus>> {
        Ok(self.status.export_status(export_id)?)
    }

    // ==========================================
    // 分配记录维护
    // ==========================================

    /// 校验单条分配（只读，不占用容量）
    pub fn validate_mapping(&self, supply_id: i64, export_id: i64, quantity_bags: i64) -> ApiResult<ValidationResult> {
        Ok(self.validator.validate(supply_id, export_id, quantity_bags)?)
    }

    /// 批量校验（累计口径，不写入）
    pub fn validate_bulk(&self, items: &[NewMapping]) -> ApiResult<BulkValidationReport> {
        Ok(self.validator.validate_bulk(items)?)
    }

    pub fn create_mapping(&self, request: &NewMapping) -> ApiResult<SupplyExportMapping> {
        Ok(self.commands.create_mapping(request)?)
    }

    /// 更新分配记录（删除 + 重建，同一事务）
    pub fn replace_mapping(
        &self,
        supply_id: i64,
        export_id: i64,
        replacement: &NewMapping,
    ) -> ApiResult<SupplyExportMapping> {
        Ok(self.commands.replace_mapping(supply_id, export_id, replacement)?)
    }

    pub fn delete_mapping(&self, supply_id: i64, export_id: i64) -> ApiResult<SupplyExportMapping> {
        let removed = self.commands.delete_mapping(supply_id, export_id)?;
        info!(supply_id, export_id, "API: 分配记录已删除");
        Ok(removed)
    }

    pub fn list_supply_allocations(&self, supply_id: i64) -> ApiResult<Vec<MappingDetail>> {
        Ok(self.commands.list_for_supply(supply_id)?)
    }

    pub fn list_export_sources(&self, export_id: i64) -> ApiResult<Vec<MappingDetail>> {
        Ok(self.commands.list_for_export(export_id)?)
    }

    // ==========================================
    // 按角色裁剪的记录视图
    // ==========================================

    /// 查询供货批次（STAFF 看不到财务字段）
    ///
    /// # 返回
    /// - Ok(Some(Value)): 裁剪后的 JSON 对象
    /// - Ok(None): 批次不存在
    pub fn get_supply_view(&self, supply_id: i64, role: Role) -> ApiResult<Option<Value>> {
        match self.repos.supply_repo.find_by_id(supply_id)? {
            Some(supply) => Ok(Some(project(&supply, role)?)),
            None => Ok(None),
        }
    }

    /// 查询出口批次（STAFF 看不到财务字段）
    pub fn get_export_view(&self, export_id: i64, role: Role) -> ApiResult<Option<Value>> {
        match self.repos.export_repo.find_by_id(export_id)? {
            Some(export) => Ok(Some(project(&export, role)?)),
            None => Ok(None),
        }
    }
}

fn project<T>(record: &T, role: Role) -> ApiResult<Value>
where
    T: Serialize + crate::domain::role::SensitiveFields,
{
    project_for_role(record, role).map_err(|e| ApiError::InternalError(format!("记录序列化失败: {}", e)))
}

fn ensure_id(field: &str, id: i64) -> ApiResult<()> {
    if id <= 0 {
        return Err(ApiError::InvalidInput(format!("{} 必须为正整数: {}", field, id)));
    }
    Ok(())
}
