use recordmap::{
    AsyncStorageTemplate, Condition, Embeddable, Entity, MapError, Mapper, SelectQuery, Value,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Embeddable, Default, Debug, Clone, PartialEq)]
struct Line {
    sku: String,
    quantity: u32,
}

#[derive(Entity, Default, Debug, Clone, PartialEq)]
#[entity(name = "orders")]
struct Order {
    #[column(id)]
    id: i64,
    customer: String,
    lines: Vec<Line>,
}

fn order(id: i64, customer: &str, skus: &[&str]) -> Order {
    Order {
        id,
        customer: customer.to_string(),
        lines: skus
            .iter()
            .map(|sku| Line {
                sku: sku.to_string(),
                quantity: 1,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_async_save_and_find() {
    let mapper = Mapper::new();
    let orders = mapper.async_repository::<Order, _>(Arc::new(mapper.in_memory_template()));

    let saved = orders.save(&order(1, "alice", &["apple", "pear"])).await.unwrap();
    assert_eq!(saved, order(1, "alice", &["apple", "pear"]));

    let found = orders.find_by_id(1).await.unwrap().unwrap();
    assert_eq!(found.lines.len(), 2);
    assert_eq!(found.lines[1].sku, "pear");
    assert!(orders.find_by_id(2).await.unwrap().is_none());
}

#[tokio::test]
async fn test_async_save_is_upsert() {
    let mapper = Mapper::new();
    let template = Arc::new(mapper.in_memory_template());
    let orders = mapper.async_repository::<Order, _>(Arc::clone(&template));

    orders.save(&order(1, "alice", &["apple"])).await.unwrap();
    orders.save(&order(1, "alice", &["apple", "plum"])).await.unwrap();

    let stored = AsyncStorageTemplate::select(template.as_ref(), &SelectQuery::new("orders"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(orders.find_by_id(1).await.unwrap().unwrap().lines.len(), 2);
}

#[tokio::test]
async fn test_async_delete_paths() {
    let mapper = Mapper::new();
    let orders = mapper.async_repository::<Order, _>(Arc::new(mapper.in_memory_template()));
    orders
        .save_all(&[order(1, "alice", &[]), order(2, "bob", &[]), order(3, "carol", &[])])
        .await
        .unwrap();

    orders.delete(&order(1, "alice", &[])).await.unwrap();
    orders.delete_by_ids([2, 5]).await.unwrap();

    let remaining = orders.find_all().await.unwrap();
    assert_eq!(remaining, vec![order(3, "carol", &[])]);
    assert!(orders.exists_by_id(3).await.unwrap());
    assert!(matches!(orders.delete_by_id(Value::Null).await, Err(MapError::NullId(_))));
}

#[tokio::test]
async fn test_async_ttl() {
    let mapper = Mapper::new();
    let orders = mapper.async_repository::<Order, _>(Arc::new(mapper.in_memory_template()));

    orders
        .save_all_with_ttl(&[order(1, "alice", &[]), order(2, "bob", &[])], Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(orders.find_by_ids([1, 2]).await.unwrap().len(), 2);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(orders.find_by_ids([1, 2]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_async_queries() {
    let mapper = Mapper::new();
    let orders = mapper.async_repository::<Order, _>(Arc::new(mapper.in_memory_template()));
    orders
        .save_all(&[order(1, "alice", &[]), order(2, "bob", &[]), order(3, "alice", &[])])
        .await
        .unwrap();

    let query = SelectQuery::new("orders")
        .filter(Condition::eq("customer", "alice"))
        .limit(1);
    assert_eq!(orders.select(&query).await.unwrap().len(), 1);

    let found = orders
        .find_by_method("findByCustomer", &[Value::from("alice")])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    orders
        .delete_by_method("deleteByCustomer", &[Value::from("alice")])
        .await
        .unwrap();
    assert_eq!(orders.find_all().await.unwrap(), vec![order(2, "bob", &[])]);

    assert!(matches!(
        orders.find_by_method("findByCustomer", &[]).await,
        Err(MapError::MissingArgument { .. })
    ));
}
