//! Demo command - the OrderTicket move on a built-in dataset.
//!
//! `order1` takes `ticket2` away from `order5`, so four end-points change
//! and three relation modifications run in one expanded command.

use super::dataset::Dataset;
use super::script::Script;
use super::CliResult;

const DATASET: &str = r#"{
    "mapping": {
        "classes": [
            { "name": "Order", "properties": { "OrderNumber": { "type": "integer", "value": 0 } } },
            { "name": "OrderTicket", "properties": { "FileName": { "type": "text", "value": "" } } }
        ],
        "relations": [
            { "kind": "one_to_one", "id": "OrderToOrderTicket",
              "real_class": "OrderTicket", "real_property": "Order",
              "virtual_class": "Order", "virtual_property": "OrderTicket" }
        ]
    },
    "objects": [
        { "alias": "order1", "class": "Order",
          "values": { "OrderNumber": { "type": "integer", "value": 1 } } },
        { "alias": "order5", "class": "Order",
          "values": { "OrderNumber": { "type": "integer", "value": 5 } } },
        { "alias": "ticket2", "class": "OrderTicket",
          "values": { "FileName": { "type": "text", "value": "ticket2.txt" } },
          "relations": { "Order": "order5" } }
    ]
}"#;

const SCRIPT: &str = r#"{
    "steps": [
        { "op": "set", "object": "order1", "property": "OrderTicket", "related": "ticket2" },
        { "op": "commit" }
    ]
}"#;

/// Runs the demo and prints its trace.
///
/// # Errors
///
/// Returns `Json` errors.
pub fn run(format: &str) -> CliResult<()> {
    let trace = super::run::execute(&Dataset::parse(DATASET)?, &Script::parse(SCRIPT)?)?;
    super::run::print(&trace, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_moves_the_ticket() {
        let trace =
            super::super::run::execute(&Dataset::parse(DATASET).unwrap(), &Script::parse(SCRIPT).unwrap())
                .unwrap();

        assert_eq!(trace.failures(), 0);
        let changing: Vec<_> = trace.steps[0]
            .events
            .iter()
            .filter(|event| event.starts_with("relation changing"))
            .cloned()
            .collect();
        assert_eq!(
            changing,
            [
                "relation changing: order5 Order.OrderTicket ticket2 -> null",
                "relation changing: ticket2 OrderTicket.Order order5 -> order1",
                "relation changing: order1 Order.OrderTicket null -> ticket2",
            ]
        );
        assert!(trace.steps[1]
            .events
            .contains(&"committed [order1, order5, ticket2]".to_string()));

        let order5 = trace.objects.iter().find(|o| o.alias == "order5").unwrap();
        assert_eq!(order5.state, "Unchanged");
        assert!(order5.relations["OrderTicket"].is_empty());
    }
}
