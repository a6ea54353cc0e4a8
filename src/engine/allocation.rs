// ==========================================
// 煤炭出口业务系统 - 分配建议与自动分配引擎
// ==========================================
// 职责: 按策略给出口批次推荐供货来源，并可直接落库
// 算法: 贪心装箱（非全局最优），结果确定、逐项可解释
// 输入: 出口批次 ID + 策略 + 过滤条件
// 输出: SuggestionSet / AllocationResult
// ==========================================

use crate::config::allocation_config::AllocationConfig;
use crate::domain::mapping::{NewMapping, SupplyExportMapping};
use crate::engine::error::{AllocationError, EngineResult};
use crate::engine::ledger::QuantityLedger;
use crate::engine::mapping_ops::MappingCommands;
use crate::engine::repositories::AllocationRepositories;
use crate::engine::scoring::{priority_score, recommendation, round2, ScoredSupply};
use crate::engine::strategy::{sort_candidates, AllocationStrategy, MinQuality};
use crate::repository::{ExportRepository, SupplyFilter, SupplyOrder, SupplyRepository};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

// ==========================================
// 请求
// ==========================================

/// 分配建议请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub export_id: i64,
    /// 为空时取配置的默认策略
    #[serde(default)]
    pub strategy: Option<AllocationStrategy>,
    #[serde(default)]
    pub max_suggestions: Option<usize>,
    /// 为空表示不限供应商
    #[serde(default)]
    pub preferred_suppliers: Vec<i64>,
    #[serde(default)]
    pub min_quality: MinQuality,
}

impl SuggestionRequest {
    pub fn new(export_id: i64) -> Self {
        Self {
            export_id,
            strategy: None,
            max_suggestions: None,
            preferred_suppliers: Vec::new(),
            min_quality: MinQuality::Any,
        }
    }

    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = Some(max);
        self
    }

    pub fn with_preferred_suppliers(mut self, supplier_ids: Vec<i64>) -> Self {
        self.preferred_suppliers = supplier_ids;
        self
    }

    pub fn with_min_quality(mut self, min_quality: MinQuality) -> Self {
        self.min_quality = min_quality;
        self
    }
}

/// 自动分配请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAllocateRequest {
    pub export_id: i64,
    #[serde(default)]
    pub strategy: Option<AllocationStrategy>,
    #[serde(default)]
    pub dry_run: bool,
}

// ==========================================
// 建议结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub grade_a: i64,
    pub grade_b: i64,
    pub rejected: i64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionMetrics {
    pub age_in_days: i64,
    pub utilization_percentage: f64,
    pub priority_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSuggestion {
    pub supply_id: i64,
    pub supplier_id: i64,
    pub supplier_name: String,
    pub supply_date: NaiveDate,
    pub total_quantity: i64,
    pub available_quantity: i64,
    pub suggested_quantity: i64,
    pub quality: QualityBreakdown,
    pub metrics: SuggestionMetrics,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub export_id: i64,
    pub destination: String,
    pub strategy: AllocationStrategy,
    pub export_quantity: i64,
    pub already_sourced: i64,
    pub still_needed: i64,
    pub fully_sourced: bool,
    pub suggestions: Vec<AllocationSuggestion>,
    pub total_suggested: i64,
    /// 全部采纳后仍缺的袋数
    pub remaining_after_suggestions: i64,
}

// ==========================================
// 自动分配结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAllocationEntry {
    pub supply_id: i64,
    pub supplier_name: String,
    pub quantity_bags: i64,
    pub priority_score: i64,
    pub dry_run: bool,
    /// 试算时为 None
    pub mapping: Option<SupplyExportMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAllocationError {
    pub supply_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total_allocations: usize,
    pub total_quantity: i64,
    pub errors: usize,
}

/// 自动分配结果（部分成功是常态，调用方需检查 errors / summary）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub success: bool,
    pub export_id: i64,
    pub strategy: AllocationStrategy,
    pub dry_run: bool,
    pub message: Option<String>,
    pub allocations: Vec<AutoAllocationEntry>,
    pub errors: Vec<AutoAllocationError>,
    pub summary: AllocationSummary,
}

// ==========================================
// AllocationEngine
// ==========================================
pub struct AllocationEngine {
    repos: AllocationRepositories,
    commands: MappingCommands,
    config: AllocationConfig,
}

impl AllocationEngine {
    pub fn new(repos: AllocationRepositories, config: AllocationConfig) -> Self {
        Self {
            commands: MappingCommands::new(repos.clone()),
            repos,
            config,
        }
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// 生成分配建议（以本地当天计算库龄）
    pub fn suggest_allocations(&self, request: &SuggestionRequest) -> EngineResult<SuggestionSet> {
        self.suggest_allocations_at(request, chrono::Local::now().date_naive())
    }

    /// 生成分配建议
    ///
    /// 步骤:
    /// 1) 出口批次不存在 → NotFound
    /// 2) 已备货完成 → 直接返回 fully_sourced，不查询供货
    /// 3) 候选过滤（偏好供应商 / 仅 A 级）并计算派生指标，剔除可用量 <= 0
    /// 4) 按策略排序
    /// 5) 贪心分配 min(可用, 剩余)，直至满足或达到条数上限
    #[instrument(skip(self, request), fields(export_id = request.export_id, today = %today))]
    pub fn suggest_allocations_at(
        &self,
        request: &SuggestionRequest,
        today: NaiveDate,
    ) -> EngineResult<SuggestionSet> {
        let strategy = request.strategy.unwrap_or(self.config.default_strategy);
        let max_suggestions = self.config.effective_max_suggestions(request.max_suggestions);

        self.repos.with_conn(|conn| {
            let export = ExportRepository::find_by_id_on(conn, request.export_id)?
                .ok_or_else(|| AllocationError::export_not_found(request.export_id))?;

            let already_sourced = QuantityLedger::sourced_quantity_on(conn, export.export_id)?;
            let still_needed = export.quantity_bags - already_sourced;

            if still_needed <= 0 {
                debug!(already_sourced, "出口批次已备货完成，跳过候选查询");
                return Ok(SuggestionSet {
                    export_id: export.export_id,
                    destination: export.destination(),
                    strategy,
                    export_quantity: export.quantity_bags,
                    already_sourced,
                    still_needed,
                    fully_sourced: true,
                    suggestions: Vec::new(),
                    total_suggested: 0,
                    remaining_after_suggestions: 0,
                });
            }

            let filter = SupplyFilter {
                supplier_ids: request.preferred_suppliers.clone(),
                require_grade_a: request.min_quality.requires_grade_a(),
            };
            let order = match strategy {
                AllocationStrategy::Lifo => SupplyOrder::SupplyDateDesc,
                _ => SupplyOrder::SupplyDateAsc,
            };

            let mut candidates: Vec<ScoredSupply> = SupplyRepository::list_with_mappings_on(conn, &filter, order)?
                .into_iter()
                .map(|listing| ScoredSupply::from_listing(listing, today))
                .filter(|c| c.available_quantity > 0)
                .collect();
            sort_candidates(&mut candidates, strategy, self.config.optimal_quality_gap);

            let candidate_count = candidates.len();
            let mut remaining = still_needed;
            let mut suggestions = Vec::new();
            for candidate in candidates {
                if remaining <= 0 || suggestions.len() >= max_suggestions {
                    break;
                }
                let quantity = candidate.available_quantity.min(remaining);
                remaining -= quantity;
                suggestions.push(self.build_suggestion(candidate, quantity, strategy));
            }

            let total_suggested: i64 = suggestions.iter().map(|s| s.suggested_quantity).sum();
            info!(
                strategy = %strategy,
                still_needed,
                candidate_count,
                suggestion_count = suggestions.len(),
                total_suggested,
                "分配建议已生成"
            );

            Ok(SuggestionSet {
                export_id: export.export_id,
                destination: export.destination(),
                strategy,
                export_quantity: export.quantity_bags,
                already_sourced,
                still_needed,
                fully_sourced: false,
                suggestions,
                total_suggested,
                remaining_after_suggestions: still_needed - total_suggested,
            })
        })
    }

    fn build_suggestion(
        &self,
        candidate: ScoredSupply,
        suggested_quantity: i64,
        strategy: AllocationStrategy,
    ) -> AllocationSuggestion {
        let ScoredSupply {
            supply,
            supplier_name,
            available_quantity,
            utilization_percentage,
            quality_score,
            age_in_days,
            ..
        } = candidate;

        AllocationSuggestion {
            supply_id: supply.supply_id,
            supplier_id: supply.supplier_id,
            supplier_name,
            supply_date: supply.supply_date,
            total_quantity: supply.quantity_bags,
            available_quantity,
            suggested_quantity,
            quality: QualityBreakdown {
                grade_a: supply.grade_a,
                grade_b: supply.grade_b,
                rejected: supply.rejected,
                score: round2(quality_score),
            },
            metrics: SuggestionMetrics {
                age_in_days,
                utilization_percentage,
                priority_score: priority_score(
                    quality_score,
                    age_in_days,
                    utilization_percentage,
                    strategy,
                    &self.config,
                ),
            },
            recommendation: recommendation(quality_score, age_in_days, utilization_percentage, &self.config),
        }
    }

    /// 自动分配（以本地当天计算库龄）
    pub fn auto_allocate(&self, request: &AutoAllocateRequest) -> EngineResult<AllocationResult> {
        self.auto_allocate_at(request, chrono::Local::now().date_naive())
    }

    /// 自动分配
    ///
    /// 逐条落库，每条独立事务；单条失败记录到 errors 后继续（非原子，
    /// 允许部分成功）。已备货完成时返回 success=false 与说明，不是错误。
    #[instrument(skip(self, request), fields(export_id = request.export_id, dry_run = request.dry_run))]
    pub fn auto_allocate_at(
        &self,
        request: &AutoAllocateRequest,
        today: NaiveDate,
    ) -> EngineResult<AllocationResult> {
        let strategy = request.strategy.unwrap_or(self.config.default_strategy);
        let suggestion_request = SuggestionRequest::new(request.export_id).with_strategy(strategy);
        let set = self.suggest_allocations_at(&suggestion_request, today)?;

        if set.fully_sourced {
            info!(already_sourced = set.already_sourced, "出口批次已备货完成，无需自动分配");
            return Ok(AllocationResult {
                success: false,
                export_id: request.export_id,
                strategy,
                dry_run: request.dry_run,
                message: Some(format!(
                    "Export #{} 已备货完成: sourced={}, total={}",
                    set.export_id, set.already_sourced, set.export_quantity
                )),
                allocations: Vec::new(),
                errors: Vec::new(),
                summary: AllocationSummary {
                    total_allocations: 0,
                    total_quantity: 0,
                    errors: 0,
                },
            });
        }

        let mut allocations = Vec::with_capacity(set.suggestions.len());
        let mut errors = Vec::new();

        for suggestion in set.suggestions {
            let priority = suggestion.metrics.priority_score;

            if request.dry_run {
                allocations.push(AutoAllocationEntry {
                    supply_id: suggestion.supply_id,
                    supplier_name: suggestion.supplier_name,
                    quantity_bags: suggestion.suggested_quantity,
                    priority_score: priority,
                    dry_run: true,
                    mapping: None,
                });
                continue;
            }

            let mapping_request = NewMapping::new(suggestion.supply_id, request.export_id, suggestion.suggested_quantity)
                .with_priority(priority)
                .with_notes(format!("Auto-allocated ({} strategy)", strategy));

            match self.commands.create_mapping(&mapping_request) {
                Ok(mapping) => allocations.push(AutoAllocationEntry {
                    supply_id: suggestion.supply_id,
                    supplier_name: suggestion.supplier_name,
                    quantity_bags: mapping.quantity_bags,
                    priority_score: priority,
                    dry_run: false,
                    mapping: Some(mapping),
                }),
                Err(err) => {
                    warn!(supply_id = suggestion.supply_id, error = %err, "自动分配单条失败，继续处理");
                    errors.push(AutoAllocationError {
                        supply_id: suggestion.supply_id,
                        message: err.to_string(),
                    });
                }
            }
        }

        let summary = AllocationSummary {
            total_allocations: allocations.len(),
            total_quantity: allocations.iter().map(|a| a.quantity_bags).sum(),
            errors: errors.len(),
        };
        info!(
            strategy = %strategy,
            total_allocations = summary.total_allocations,
            total_quantity = summary.total_quantity,
            errors = summary.errors,
            "自动分配完成"
        );

        Ok(AllocationResult {
            success: errors.is_empty(),
            export_id: request.export_id,
            strategy,
            dry_run: request.dry_run,
            message: None,
            allocations,
            errors,
            summary,
        })
    }
}
