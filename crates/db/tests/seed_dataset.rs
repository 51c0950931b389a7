use std::error::Error;

use rust_decimal::Decimal;
use tempfile::TempDir;

use claimscope_core::domain::inspection::{DamageId, RoomId, SessionId};
use claimscope_core::export::{
    generate_interchange_archive, read_detail_items, ExportOptions, ExportSettings, ExportSource,
};
use claimscope_core::scope::{ScopeAssembler, ScopeStore};
use claimscope_db::repositories::{
    opening_wall_deduction, CatalogRepository, InspectionRepository, ScopeSummaryRepository,
};
use claimscope_db::{connect_with_settings, migrations, InMemoryStore, SeedDataset, SqlStore};

type TestResult<T = ()> = Result<T, Box<dyn Error>>;

const SESSION: &str = "session-demo-001";
const KITCHEN: &str = "room-demo-kitchen";
const HALL: &str = "room-demo-hall";

trait DemoStore:
    ScopeStore + ExportSource + InspectionRepository + CatalogRepository + ScopeSummaryRepository
{
}

impl<T> DemoStore for T where
    T: ScopeStore + ExportSource + InspectionRepository + CatalogRepository + ScopeSummaryRepository
{
}

async fn sqlite_store() -> TestResult<SqlStore> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await?;
    migrations::run_pending(&pool).await?;
    Ok(SqlStore::new(pool))
}

async fn assemble_room<S: DemoStore>(
    assembler: &ScopeAssembler<S>,
    room_id: &str,
    damage_id: &str,
) -> TestResult<claimscope_core::scope::ScopeAssemblyResult> {
    let store = assembler.store();
    let room = store.find_room(&RoomId(room_id.to_string())).await?.ok_or("room missing")?;
    let damage =
        store.find_damage(&DamageId(damage_id.to_string())).await?.ok_or("damage missing")?;
    let openings = store.openings_for_session(&room.session_id).await?;
    let deduction = opening_wall_deduction(&openings, &room.id);

    Ok(assembler.assemble_scope_with_deduction(&room, &damage, deduction).await?)
}

async fn demo_flow<S: DemoStore>(store: S) -> TestResult {
    let dataset = SeedDataset::demo()?;
    dataset.load_into(&store).await?;
    let verification = dataset.verify(&store).await?;
    assert!(verification.all_present, "failed checks: {:?}", verification.checks);

    let assembler = ScopeAssembler::new(store);
    let kitchen = assemble_room(&assembler, KITCHEN, "damage-demo-kitchen-1").await?;

    let created: Vec<&str> =
        kitchen.created.iter().map(|item| item.catalog_code.as_str()).collect();
    assert_eq!(
        created,
        vec!["DRY-12-SF", "DRY-TAPE-SF", "PNT-WALL-SF", "PNT-CEIL-SF", "FLR-VIN-SF", "FLR-BASE-LF"]
    );
    assert!(kitchen.companion_items.iter().any(|item| item.catalog_code == "DEM-DRY-SF"));
    // 14x12x8 room minus a 3x6.75 door and a 4x3 window
    assert_eq!(kitchen.created[0].quantity, Decimal::new(38375, 2));
    assert_eq!(kitchen.created[4].quantity, Decimal::from(168));

    let repeat = assemble_room(&assembler, KITCHEN, "damage-demo-kitchen-1").await?;
    assert_eq!(repeat.total_created(), 0);
    assert!(repeat.warnings.iter().any(|warning| warning.contains("already in scope")));

    let hall = assemble_room(&assembler, HALL, "damage-demo-hall-1").await?;
    assert!(hall.created.iter().any(|item| item.catalog_code == "MIT-DEHU-EA"));

    let store = assembler.store();
    let session_id = SessionId(SESSION.to_string());
    let summary = store.find_scope_summary(&session_id).await?.ok_or("summary missing")?;
    assert_eq!(summary.active_items, kitchen.total_created() + hall.total_created());
    assert_eq!(summary.rooms_with_scope, 2);

    let archive = generate_interchange_archive(
        &session_id,
        store,
        &ExportSettings::default(),
        &ExportOptions::default(),
    )
    .await?;
    let rooms = read_detail_items(&archive)?;
    let kitchen_lines = rooms.get("Kitchen").ok_or("kitchen group missing")?;
    assert_eq!(kitchen_lines.len(), kitchen.total_created());
    assert!(kitchen_lines.iter().all(|line| line.rcv_total > Decimal::ZERO));
    assert!(rooms
        .get("Hallway")
        .ok_or("hallway group missing")?
        .iter()
        .any(|line| line.code == "MIT-DEHU-EA"));
    assert!(!rooms.contains_key("Unassigned"));

    Ok(())
}

#[tokio::test]
async fn demo_dataset_assembles_and_exports_in_memory() -> TestResult {
    demo_flow(InMemoryStore::new()).await
}

#[tokio::test]
async fn demo_dataset_assembles_and_exports_on_sqlite() -> TestResult {
    demo_flow(sqlite_store().await?).await
}

#[tokio::test]
async fn reseeding_sqlite_keeps_catalog_order_and_upserts_prices() -> TestResult {
    let store = sqlite_store().await?;
    let mut dataset = SeedDataset::demo()?;
    dataset.load_into(&store).await?;

    dataset.openings.clear();
    for price in &mut dataset.regional_prices {
        if price.line_item_code == "DRY-12-SF" && price.region_id == "US_NATIONAL" {
            price.labor_cost = Some(Decimal::new(155, 2));
        }
    }
    dataset.load_into(&store).await?;

    let catalog: Vec<String> =
        store.catalog_entries().await?.into_iter().map(|entry| entry.code).collect();
    let seeded: Vec<String> = dataset.catalog.iter().map(|entry| entry.code.clone()).collect();
    assert_eq!(catalog, seeded);

    let prices = store.regional_prices("US_NATIONAL").await?;
    let drywall = prices
        .iter()
        .find(|price| price.line_item_code == "DRY-12-SF")
        .ok_or("drywall price missing")?;
    assert_eq!(drywall.labor_cost, Some(Decimal::new(155, 2)));
    assert_eq!(prices.len(), 10);
    Ok(())
}

#[tokio::test]
async fn file_database_keeps_assembled_scope_across_reconnects() -> TestResult {
    let dir = TempDir::new()?;
    let url = format!("sqlite://{}", dir.path().join("claimscope.db").display());
    let session_id = SessionId(SESSION.to_string());

    let pool = connect_with_settings(&url, 1, 30).await?;
    migrations::run_pending(&pool).await?;
    let store = SqlStore::new(pool.clone());
    SeedDataset::demo()?.load_into(&store).await?;
    let assembler = ScopeAssembler::new(store);
    let kitchen = assemble_room(&assembler, KITCHEN, "damage-demo-kitchen-1").await?;
    pool.close().await;

    let pool = connect_with_settings(&url, 1, 30).await?;
    migrations::run_pending(&pool).await?;
    let store = SqlStore::new(pool);

    let items = store.session_scope_items(&session_id).await?;
    assert_eq!(items.len(), kitchen.total_created());
    let summary = store.find_scope_summary(&session_id).await?.ok_or("summary missing")?;
    assert_eq!(summary.active_items, kitchen.total_created());
    assert_eq!(summary.rooms_with_scope, 1);

    let repeat =
        assemble_room(&ScopeAssembler::new(store), KITCHEN, "damage-demo-kitchen-1").await?;
    assert_eq!(repeat.total_created(), 0);
    Ok(())
}
