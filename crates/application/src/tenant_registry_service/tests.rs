use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use civicvault_core::AppError;
use civicvault_domain::{ComplianceLevel, PartitionAssigner, TenantListFilter, TenantStatus};

use crate::test_support::{FakeRegistryRepository, new_tenant, tenant_id};
use crate::{IsolationSettings, RegistryCacheSettings, TenantRegistryService};

fn service(repository: Arc<FakeRegistryRepository>) -> TenantRegistryService {
    TenantRegistryService::new(
        repository,
        PartitionAssigner::default(),
        RegistryCacheSettings::default(),
        IsolationSettings::default(),
    )
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let service = service(Arc::new(FakeRegistryRepository::default()));

    let first = service.register(new_tenant("malmo_stad")).await;
    assert_eq!(first, Ok(tenant_id("malmo_stad")));

    let second = service.register(new_tenant("malmo_stad")).await;
    assert!(matches!(second, Err(AppError::DuplicateTenant(_))));
}

#[tokio::test]
async fn get_unknown_tenant_is_not_found() {
    let service = service(Arc::new(FakeRegistryRepository::default()));

    let result = service.get(&tenant_id("berlin_de")).await;
    assert!(matches!(result, Err(AppError::TenantNotFound(_))));
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");

    assert!(
        service
            .update_status(&malmo, TenantStatus::Migrating)
            .await
            .is_ok()
    );
    let result = service.update_status(&malmo, TenantStatus::Suspended).await;
    assert!(matches!(result, Err(AppError::InvalidTransition(_))));

    let stored = service.get(&malmo).await;
    assert_eq!(
        stored.map(|tenant| tenant.status()),
        Ok(TenantStatus::Migrating)
    );
}

#[tokio::test]
async fn migrating_tenants_do_not_serve() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");
    assert!(
        service
            .update_status(&malmo, TenantStatus::Migrating)
            .await
            .is_ok()
    );

    let result = service.require_serving(&malmo).await;
    assert!(matches!(result, Err(AppError::TenantMigrating(_))));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_suspension_is_visible_on_writing_node_immediately() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");
    assert!(service.require_serving(&malmo).await.is_ok());

    assert!(
        service
            .update_status(&malmo, TenantStatus::Suspended)
            .await
            .is_ok()
    );

    let result = service.require_serving(&malmo).await;
    assert!(matches!(result, Err(AppError::TenantInactive(_))));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_other_nodes_converge_within_ttl() {
    let repository = Arc::new(FakeRegistryRepository::default());
    let writer = service(repository.clone());
    let reader = service(repository);
    assert!(writer.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");

    assert!(reader.require_serving(&malmo).await.is_ok());
    assert!(
        writer
            .update_status(&malmo, TenantStatus::Suspended)
            .await
            .is_ok()
    );

    tokio::time::advance(Duration::from_secs(5)).await;

    let result = reader.require_serving(&malmo).await;
    assert!(matches!(result, Err(AppError::TenantInactive(_))));
}

#[tokio::test(start_paused = true)]
async fn cached_reads_skip_the_repository_while_fresh() {
    let repository = Arc::new(FakeRegistryRepository::default());
    let service = service(repository.clone());
    assert!(service.register(new_tenant("berlin_de")).await.is_ok());
    let berlin = tenant_id("berlin_de");
    let baseline = repository.lookups.load(Ordering::SeqCst);

    assert!(service.get(&berlin).await.is_ok());
    assert!(service.get(&berlin).await.is_ok());
    assert_eq!(repository.lookups.load(Ordering::SeqCst), baseline + 1);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(service.get(&berlin).await.is_ok());
    assert_eq!(repository.lookups.load(Ordering::SeqCst), baseline + 2);
}

#[test]
fn cache_ttl_is_capped() {
    let settings = RegistryCacheSettings::new(Duration::from_secs(60));
    assert_eq!(settings.ttl, Duration::from_secs(5));
}

#[tokio::test]
async fn compliance_upgrades_only_go_up() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");

    let upgraded = service
        .upgrade_compliance(&malmo, ComplianceLevel::GovernmentGrade)
        .await;
    assert_eq!(
        upgraded.map(|tenant| tenant.compliance_level()),
        Ok(ComplianceLevel::GovernmentGrade)
    );

    let downgrade = service
        .upgrade_compliance(&malmo, ComplianceLevel::Basic)
        .await;
    assert!(matches!(downgrade, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn remove_requires_suspension() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    let malmo = tenant_id("malmo_stad");

    let active = service.remove(&malmo).await;
    assert!(matches!(active, Err(AppError::InvalidTransition(_))));

    assert!(
        service
            .update_status(&malmo, TenantStatus::Suspended)
            .await
            .is_ok()
    );
    assert!(service.remove(&malmo).await.is_ok());
    assert!(matches!(
        service.get(&malmo).await,
        Err(AppError::TenantNotFound(_))
    ));
}

#[tokio::test]
async fn list_applies_filter() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    assert!(service.register(new_tenant("malmo_stad")).await.is_ok());
    assert!(service.register(new_tenant("berlin_de")).await.is_ok());
    assert!(
        service
            .update_status(&tenant_id("berlin_de"), TenantStatus::Suspended)
            .await
            .is_ok()
    );

    let suspended = service
        .list(&TenantListFilter {
            status: Some(TenantStatus::Suspended),
            ..TenantListFilter::default()
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(suspended.len(), 1);
    assert_eq!(suspended[0].tenant_id(), &tenant_id("berlin_de"));
}

#[tokio::test]
async fn rebalance_plan_covers_registered_tenants() {
    let service = service(Arc::new(FakeRegistryRepository::default()));
    for tenant in ["malmo_stad", "berlin_de", "oslo_kommune", "wien_at"] {
        assert!(service.register(new_tenant(tenant)).await.is_ok());
    }

    let plan = service
        .plan_partition_rebalance(64)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(plan.current_count, 32);
    assert_eq!(plan.target_count, 64);
    assert!(plan.moves.len() <= 4);
    assert!(plan.moves.iter().all(|step| step.from_partition != step.to_partition));
}
