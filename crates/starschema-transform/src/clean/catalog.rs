//! Built-in cleaning rules for the operational schema.

use super::{CleanOp, EntityRules, RuleSet};

/// Entities in the order they are cleaned.
pub const ENTITIES: [&str; 19] = [
    "category",
    "customer",
    "department",
    "employee",
    "inventory",
    "location",
    "manufacturer",
    "payment",
    "product",
    "purchaseorder",
    "purchaseorderdetail",
    "returndetail",
    "returns",
    "salesorder",
    "salesorderdetail",
    "shipment",
    "shipmentdetail",
    "supplier",
    "warehouse",
];

pub fn default_rule_set() -> RuleSet {
    RuleSet {
        entities: catalog_entities(),
    }
}

fn keyed(entity: &str, natural_key: &[&str], ops: Vec<CleanOp>) -> EntityRules {
    let mut all = vec![CleanOp::DropNullKeys, CleanOp::DedupByKey];
    all.extend(ops);
    EntityRules::new(entity, natural_key, all)
}

fn catalog_entities() -> Vec<EntityRules> {
    vec![
        keyed(
            "category",
            &["categoryid"],
            vec![
                CleanOp::backfill_from_peer("name", "description"),
                CleanOp::fill_text(&["name"]),
                CleanOp::drop_columns(&["description"]),
            ],
        ),
        keyed(
            "customer",
            &["customerid"],
            vec![
                CleanOp::fill_text(&["preferredpaymentmethod", "accountstatus", "address"]),
                CleanOp::fill_median(&["creditlimit"], &[]),
                CleanOp::round(&["creditlimit"]),
                CleanOp::drop_columns(&["contactinfo", "email"]),
            ],
        ),
        keyed(
            "department",
            &["departmentid"],
            vec![
                CleanOp::fill_median(&["budget"], &[]),
                CleanOp::fill_text(&["name"]),
                CleanOp::round(&["budget"]),
            ],
        ),
        keyed(
            "employee",
            &["employeeid"],
            vec![
                CleanOp::fill_median(&["salary", "commission"], &["roleid"]),
                CleanOp::drop_columns(&["name", "contactinfo"]),
                CleanOp::round(&["salary", "commission"]),
                CleanOp::coerce_date(&["hiredate"]),
            ],
        ),
        keyed(
            "inventory",
            &["productid", "warehouseid"],
            vec![
                CleanOp::coerce_date(&["lastreorderdate", "expecteddeliverydate"]),
                CleanOp::fill_date(&["lastreorderdate"]),
                CleanOp::fill_mean(&["reorderpoint"], &["warehouseid"]),
                CleanOp::fill_mean(
                    &["minimumstocklevel", "maximumstocklevel"],
                    &["warehouseid", "productid"],
                ),
                CleanOp::truncate_int(&["reorderpoint"]),
            ],
        ),
        keyed(
            "location",
            &["locationid"],
            vec![
                CleanOp::drop_columns(&["latitude", "longitude", "postalcode"]),
                CleanOp::fill_text(&["country", "region", "city"]),
            ],
        ),
        keyed(
            "manufacturer",
            &["manufacturerid"],
            vec![
                CleanOp::drop_columns(&["contactinfo", "email"]),
                CleanOp::fill_text(&["name", "address", "country", "phone"]),
            ],
        ),
        keyed(
            "payment",
            &["paymentid"],
            vec![
                CleanOp::fill_text(&["paymentmethod", "status"]),
                CleanOp::fill_zero(&["amount", "confirmationnumber"]),
                CleanOp::coerce_date(&["paymentdate"]),
                CleanOp::round(&["amount"]),
            ],
        ),
        keyed(
            "product",
            &["productid"],
            vec![
                CleanOp::fill_text(&["name", "discontinued"]),
                CleanOp::fill_zero(&["price", "stocklevel", "reorderlevel"]),
                CleanOp::round(&["price", "reorderlevel"]),
                CleanOp::drop_columns(&["description"]),
            ],
        ),
        keyed(
            "purchaseorder",
            &["orderid"],
            vec![
                CleanOp::fill_text(&["status", "paymentmethod", "paymentstatus"]),
                CleanOp::fill_zero(&["totalamount"]),
                CleanOp::coerce_date(&["orderdate", "expecteddeliverydate", "actualdeliverydate"]),
                CleanOp::fill_date(&["orderdate"]),
                CleanOp::round(&["totalamount"]),
                CleanOp::drop_columns(&["comments"]),
            ],
        ),
        keyed(
            "purchaseorderdetail",
            &["orderid", "productid"],
            vec![
                CleanOp::fill_zero(&["quantity", "tax", "unitprice"]),
                CleanOp::fill_text(&["deliverystatus"]),
                CleanOp::round(&["unitprice"]),
            ],
        ),
        keyed(
            "returndetail",
            &["returnid", "productid"],
            vec![CleanOp::fill_zero(&[
                "quantity",
                "unitprice",
                "discount",
                "tax",
                "totalamount",
            ])],
        ),
        keyed(
            "returns",
            &["returnid"],
            vec![
                CleanOp::fill_text(&["refundmethod", "refundstatus"]),
                CleanOp::fill_zero(&["refundamount"]),
                CleanOp::coerce_date(&["returndate"]),
                CleanOp::fill_date(&["returndate"]),
                CleanOp::round(&["refundamount"]),
                CleanOp::drop_columns(&["comments", "reason"]),
            ],
        ),
        keyed(
            "salesorder",
            &["orderid"],
            vec![
                CleanOp::fill_text(&["status", "paymentmethod", "paymentstatus"]),
                CleanOp::fill_zero(&["totalamount"]),
                CleanOp::coerce_date(&["orderdate", "expecteddeliverydate", "actualdeliverydate"]),
                CleanOp::fill_date(&["orderdate", "expecteddeliverydate"]),
                CleanOp::round(&["totalamount"]),
            ],
        ),
        keyed(
            "salesorderdetail",
            &["orderid", "productid"],
            vec![
                CleanOp::fill_zero(&["quantity", "unitprice", "tax", "discount", "totalamount"]),
                CleanOp::fill_text(&["deliverystatus"]),
                CleanOp::round(&["unitprice", "totalamount", "tax"]),
            ],
        ),
        keyed(
            "shipment",
            &["shipmentid"],
            vec![
                CleanOp::fill_text(&["status", "carrier", "trackingnumber"]),
                CleanOp::coerce_date(&["shipmentdate", "estimatedarrivaldate", "actualarrivaldate"]),
                CleanOp::fill_date(&["estimatedarrivaldate", "shipmentdate"]),
            ],
        ),
        keyed(
            "shipmentdetail",
            &["shipmentid", "productid"],
            vec![CleanOp::fill_zero(&[
                "quantity",
                "unitprice",
                "tax",
                "discount",
                "totalamount",
            ])],
        ),
        keyed(
            "supplier",
            &["supplierid"],
            vec![
                CleanOp::fill_text(&["name", "contactinfo", "country"]),
                CleanOp::fill_zero(&["rating"]),
                CleanOp::coerce_date(&["contractstartdate", "contractenddate"]),
                CleanOp::fill_date(&["contractstartdate"]),
            ],
        ),
        keyed(
            "warehouse",
            &["warehouseid"],
            vec![CleanOp::fill_text(&["managerid", "locationid", "capacity"])],
        ),
    ]
}
