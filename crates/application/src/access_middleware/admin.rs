use civicvault_core::{AppError, AppResult, TenantContext, TenantId, TenantRole};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::{AccessMiddleware, AccessResponse, AdminOperation, AdminRequest, to_payload};

impl AccessMiddleware {
    /// Runs one registry administration request. Requires `administrator`.
    ///
    /// The caller's own tenant must be registered and active. The only
    /// exception is an administrator provisioning their own tenant into an
    /// empty registry. Audited exactly once, like [`AccessMiddleware::handle`].
    pub async fn administer(
        &self,
        request: AdminRequest,
        caller: &TenantContext,
    ) -> AppResult<AccessResponse> {
        let scope = request
            .operation
            .audit_scope(caller)
            .with_origin(request.source_ip.clone(), request.user_agent.clone());

        let outcome: AppResult<AccessResponse> = async {
            self.rate_limit.check_tenant(caller.tenant_id()).await?;
            self.require_admin_tenant(&request.operation, caller).await?;
            caller.require_role(TenantRole::Administrator)?;
            let payload = self.run_admin(&request.operation, caller).await?;
            Ok(AccessResponse { payload })
        }
        .await;

        self.record_outcome(caller, scope, &outcome).await;
        outcome
    }

    async fn require_admin_tenant(
        &self,
        operation: &AdminOperation,
        caller: &TenantContext,
    ) -> AppResult<()> {
        let error = match self.registry.require_serving(caller.tenant_id()).await {
            Ok(_) => return Ok(()),
            Err(error) => error,
        };

        let provisions_own_tenant = matches!(
            operation,
            AdminOperation::Register(input) if &input.tenant_id == caller.tenant_id()
        );
        if matches!(error, AppError::TenantNotFound(_))
            && provisions_own_tenant
            && caller.role() == TenantRole::Administrator
            && self.registry.is_empty().await?
        {
            warn!(
                tenant_id = %caller.tenant_id(),
                user_id = caller.user_id(),
                "bootstrapping empty registry with the operator tenant"
            );
            return Ok(());
        }

        Err(error)
    }

    async fn run_admin(
        &self,
        operation: &AdminOperation,
        caller: &TenantContext,
    ) -> AppResult<Value> {
        match operation {
            AdminOperation::Register(input) => {
                let tenant_id = self.registry.register(input.clone()).await?;
                let tenant = self.registry.get(&tenant_id).await?;
                to_payload(&tenant)
            }
            AdminOperation::UpdateStatus { tenant_id, status } => {
                let tenant_id = TenantId::parse(tenant_id.as_str())?;
                let tenant = self.registry.update_status(&tenant_id, *status).await?;
                to_payload(&tenant)
            }
            AdminOperation::UpgradeCompliance { tenant_id, level } => {
                let tenant_id = TenantId::parse(tenant_id.as_str())?;
                let tenant = self.registry.upgrade_compliance(&tenant_id, *level).await?;
                to_payload(&tenant)
            }
            AdminOperation::Deregister { tenant_id } => {
                let tenant_id = TenantId::parse(tenant_id.as_str())?;
                self.deregister(&tenant_id).await?;
                Ok(json!({ "tenant_id": tenant_id.as_str(), "deregistered": true }))
            }
            AdminOperation::PlanRebalance {
                target_partition_count,
            } => {
                let plan = self
                    .registry
                    .plan_partition_rebalance(*target_partition_count)
                    .await?;
                info!(
                    requested_by = caller.user_id(),
                    current = plan.current_count,
                    target = plan.target_count,
                    moves = plan.moves.len(),
                    "partition rebalance planned"
                );
                to_payload(&plan)
            }
            AdminOperation::ListTenants(filter) => {
                let tenants = self.registry.list(filter).await?;
                to_payload(&tenants)
            }
            AdminOperation::ListAccessEntries {
                tenant_id,
                since,
                limit,
            } => {
                let tenant_id = TenantId::parse(tenant_id.as_str())?;
                let entries = self
                    .audit
                    .entries_for_tenant(&tenant_id, *since, *limit)
                    .await?;
                to_payload(&entries)
            }
            AdminOperation::ListViolations {
                violation_type,
                since,
                limit,
            } => {
                let entries = self
                    .audit
                    .violations(*violation_type, *since, *limit)
                    .await?;
                to_payload(&entries)
            }
        }
    }

    async fn deregister(&self, tenant_id: &TenantId) -> AppResult<()> {
        self.registry.get(tenant_id).await?;

        let remaining = self.dal.count(tenant_id, None).await?;
        if remaining > 0 {
            return Err(AppError::Conflict(format!(
                "tenant still owns {remaining} records; erase its data first"
            )));
        }

        self.registry.remove(tenant_id).await?;
        self.cache.delete_all(tenant_id).await?;
        Ok(())
    }
}
