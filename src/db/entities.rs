//! Every table the service owns.

use super::schema::{FieldDef as F, IndexDef, TableSchema};

pub static CONFIG: TableSchema = TableSchema {
    name: "config",
    fields: &[
        F::integer("dataID"),
        F::text("dataName"),
        F::text("key1"),
        F::text("key2"),
        F::text("value"),
        F::text("status"),
        F::text("steamID"),
    ],
    indexes: &[],
};

pub static FUNDS: TableSchema = TableSchema {
    name: "funds",
    fields: &[
        F::text("sources_of_funds"),
        F::text("type"),
        F::real("amount"),
        F::datetime("date"),
    ],
    indexes: &[IndexDef {
        name: "funds_idx",
        columns: &["sources_of_funds", "type", "amount", "date"],
    }],
};

pub static BUY: TableSchema = TableSchema {
    name: "buy",
    fields: &[
        F::text("ID").key(),
        F::text("weapon_name"),
        F::text("weapon_type"),
        F::text("item_name"),
        F::real("weapon_float"),
        F::text("float_range"),
        F::real("price"),
        F::text("seller_name"),
        F::text("status"),
        F::text("status_sub"),
        F::text("from").key(),
        F::datetime("order_time"),
        F::text("steam_id"),
        F::integer("buy_number"),
        F::integer("err_number"),
        F::text("sell_of"),
        F::text("st"),
        F::text("sou"),
        F::text("payment"),
        F::text("trade_type"),
        F::text("data_user"),
    ],
    indexes: &[IndexDef {
        name: "buy_idx",
        columns: &[
            "weapon_name",
            "item_name",
            "weapon_float",
            "float_range",
            "price",
            "seller_name",
            "status",
            "from",
        ],
    }],
};

const SELL_FIELDS: &[F] = &[
    F::text("ID").key(),
    F::text("weapon_name"),
    F::text("weapon_type"),
    F::text("item_name"),
    F::real("weapon_float"),
    F::text("float_range"),
    F::real("price"),
    F::real("price_original"),
    F::text("buyer_name"),
    F::datetime("order_time"),
    F::text("status"),
    F::text("status_sub"),
    F::text("from"),
    F::text("steam_id"),
    F::text("st"),
    F::text("sou"),
    F::text("data_user"),
];

pub static SELL: TableSchema = TableSchema {
    name: "sell",
    fields: SELL_FIELDS,
    indexes: &[IndexDef {
        name: "sell_idx",
        columns: &[
            "weapon_name",
            "item_name",
            "weapon_float",
            "float_range",
            "price",
            "buyer_name",
            "order_time",
            "status",
            "from",
        ],
    }],
};

pub static LEASE: TableSchema = TableSchema {
    name: "lease",
    fields: &[
        F::text("ID").key(),
        F::integer("lease_day"),
        F::text("status"),
        F::real("unit_price"),
        F::real("deposit"),
        F::datetime("create_time"),
        F::text("item_name"),
        F::text("weapon_name"),
        F::text("weapon_type"),
        F::text("float_range"),
        F::real("weapon_float"),
        F::text("leaser_id"),
        F::text("leaser_name"),
        F::text("buy_of"),
        F::text("lease_from"),
    ],
    indexes: &[IndexDef {
        name: "lease_idx",
        columns: &["status", "create_time", "item_name", "weapon_name"],
    }],
};

/// Platform buy ledger columns, shared by yyyp and buff.
const PLATFORM_BUY_FIELDS: &[F] = &[
    F::text("ID").key(),
    F::text("weapon_name"),
    F::text("weapon_type"),
    F::text("item_name"),
    F::real("weapon_float"),
    F::text("float_range"),
    F::real("price"),
    F::real("price_all"),
    F::text("seller_name"),
    F::text("status"),
    F::text("status_sub"),
    F::text("from"),
    F::datetime("order_time"),
    F::text("steam_id"),
    F::integer("buy_number"),
    F::integer("err_number"),
    F::text("sell_of"),
    F::text("st"),
    F::text("sou"),
    F::text("payment"),
    F::text("trade_type"),
    F::text("data_status"),
    F::text("data_user"),
];

pub static YYYP_BUY: TableSchema = TableSchema {
    name: "yyyp_buy",
    fields: PLATFORM_BUY_FIELDS,
    indexes: &[IndexDef {
        name: "yyyp_buy_idx",
        columns: &[
            "weapon_name",
            "item_name",
            "weapon_float",
            "float_range",
            "price",
            "seller_name",
            "status",
            "from",
        ],
    }],
};

pub static BUFF_BUY: TableSchema = TableSchema {
    name: "buff_buy",
    fields: PLATFORM_BUY_FIELDS,
    indexes: &[IndexDef {
        name: "buff_buy_idx",
        columns: &[
            "weapon_name",
            "item_name",
            "weapon_float",
            "float_range",
            "price",
            "seller_name",
            "status",
            "from",
        ],
    }],
};

pub static YYYP_SELL: TableSchema = TableSchema {
    name: "yyyp_sell",
    fields: SELL_FIELDS,
    indexes: &[IndexDef {
        name: "yyyp_sell_idx",
        columns: &["weapon_name", "item_name", "price", "order_time", "status"],
    }],
};

pub static BUFF_SELL: TableSchema = TableSchema {
    name: "buff_sell",
    fields: &[
        F::text("ID").key(),
        F::text("weapon_name"),
        F::text("weapon_type"),
        F::text("item_name"),
        F::real("weapon_float"),
        F::text("float_range"),
        F::real("price"),
        F::real("price_original"),
        F::text("buyer_name"),
        F::datetime("order_time"),
        F::text("status"),
        F::text("status_sub"),
        F::text("from"),
        F::text("steam_id"),
        F::text("data_user"),
    ],
    indexes: &[IndexDef {
        name: "buff_sell_idx",
        columns: &[
            "weapon_name",
            "item_name",
            "weapon_float",
            "float_range",
            "price",
            "buyer_name",
            "order_time",
            "status",
            "from",
        ],
    }],
};

pub static YYYP_LENT: TableSchema = TableSchema {
    name: "yyyp_lent",
    fields: &[
        F::text("ID").key(),
        F::text("weapon_name"),
        F::text("weapon_type"),
        F::text("item_name"),
        F::real("weapon_float"),
        F::text("float_range"),
        F::real("price"),
        F::text("lenter_name"),
        F::text("status"),
        F::text("last_status"),
        F::text("from"),
        F::datetime("lean_start_time"),
        F::datetime("lean_end_time"),
        F::integer("total_Lease_Days"),
        F::integer("max_Lease_Days"),
        F::text("data_user"),
    ],
    indexes: &[IndexDef {
        name: "yyyp_lent_idx",
        columns: &[
            "weapon_name",
            "weapon_float",
            "float_range",
            "price",
            "lenter_name",
            "lean_start_time",
            "status",
            "from",
        ],
    }],
};

pub static YYYP_MESSAGEBOX: TableSchema = TableSchema {
    name: "yyyp_messagebox",
    fields: &[
        F::text("message_id").key(),
        F::text("title"),
        F::text("templateCode"),
        F::integer("imageType"),
        F::integer("readStatus"),
        F::integer("message_type"),
        F::text("orderNo"),
        F::integer("showStyle"),
        F::text("sentName"),
        F::datetime("createTime"),
        F::text("message_text"),
    ],
    indexes: &[],
};

pub static YYYP_WEAPON_CLASS_ID: TableSchema = TableSchema {
    name: "yyyp_weapon_classID",
    fields: &[
        F::integer("Id").key(),
        F::text("CommodityName"),
        F::text("weapon_type"),
        F::text("weapon_name"),
        F::text("item_name"),
        F::datetime("created_at").default("CURRENT_TIMESTAMP"),
        F::datetime("updated_at").default("CURRENT_TIMESTAMP"),
    ],
    indexes: &[
        IndexDef {
            name: "yyyp_weapon_classID_idx_weapon_type",
            columns: &["weapon_type"],
        },
        IndexDef {
            name: "yyyp_weapon_classID_idx_weapon_name",
            columns: &["weapon_name"],
        },
        IndexDef {
            name: "yyyp_weapon_classID_idx_item_name",
            columns: &["item_name"],
        },
    ],
};

pub static WEAPON_CLASS_ID: TableSchema = TableSchema {
    name: "weapon_classID",
    fields: &[
        F::text("steam_hash_name").key(),
        F::integer("yyyp_id"),
        F::integer("buff_id"),
        F::integer("steam_id"),
        F::text("yyyp_class_name"),
        F::text("buff_class_name"),
        F::text("market_listing_item_name"),
        F::text("weapon_type"),
        F::text("weapon_name"),
        F::text("item_name"),
        F::text("float_range"),
        F::text("Rarity"),
    ],
    indexes: &[
        IndexDef {
            name: "weapon_classID_idx_yyyp_id",
            columns: &["yyyp_id"],
        },
        IndexDef {
            name: "weapon_classID_idx_buff_id",
            columns: &["buff_id"],
        },
        IndexDef {
            name: "weapon_classID_idx_steam_id",
            columns: &["steam_id"],
        },
    ],
};

const STEAM_MARKET_FIELDS: &[F] = &[
    F::text("ID").key(),
    F::text("asset_id"),
    F::real("price"),
    F::text("trade_date"),
    F::text("listing_date"),
    F::text("game_name"),
    F::text("weapon_type"),
    F::text("weapon_name"),
    F::text("item_name"),
    F::text("float_range"),
    F::real("weapon_float"),
    F::text("inspect_link"),
    F::text("data_user"),
];

pub static STEAM_BUY: TableSchema = TableSchema {
    name: "steam_buy",
    fields: STEAM_MARKET_FIELDS,
    indexes: &[
        IndexDef {
            name: "steam_buy_idx_weapon",
            columns: &["weapon_name", "item_name"],
        },
        IndexDef {
            name: "steam_buy_idx_date",
            columns: &["trade_date"],
        },
        IndexDef {
            name: "steam_buy_idx_price",
            columns: &["price"],
        },
    ],
};

pub static STEAM_SELL: TableSchema = TableSchema {
    name: "steam_sell",
    fields: &[
        F::text("ID").key(),
        F::text("asset_id"),
        F::real("price"),
        F::real("price_original"),
        F::text("trade_date"),
        F::text("listing_date"),
        F::text("game_name"),
        F::text("weapon_type"),
        F::text("weapon_name"),
        F::text("item_name"),
        F::text("float_range"),
        F::real("weapon_float"),
        F::text("inspect_link"),
        F::text("data_user"),
    ],
    indexes: &[
        IndexDef {
            name: "steam_sell_idx_weapon",
            columns: &["weapon_name", "item_name"],
        },
        IndexDef {
            name: "steam_sell_idx_date",
            columns: &["trade_date"],
        },
        IndexDef {
            name: "steam_sell_idx_price",
            columns: &["price", "price_original"],
        },
    ],
};

pub static STEAM_INVENTORY: TableSchema = TableSchema {
    name: "steam_inventory",
    fields: &[
        F::text("assetid"),
        F::text("instanceid"),
        F::text("classid"),
        F::datetime("order_time"),
        F::text("item_name"),
        F::text("weapon_name"),
        F::text("float_range"),
        F::text("weapon_type"),
        F::text("weapon_float"),
        F::text("trade_type"),
        F::text("remark"),
        F::text("buy_price"),
        F::text("data_user"),
        F::text("yyyp_price"),
        F::text("buff_price"),
        F::text("steam_price"),
        // '1' while the item is still held.
        F::text("if_inventory").default("'1'"),
    ],
    indexes: &[
        IndexDef {
            name: "steam_inventory_idx_order_time",
            columns: &["order_time"],
        },
        IndexDef {
            name: "steam_inventory_idx_trade_type",
            columns: &["trade_type"],
        },
        IndexDef {
            name: "steam_inventory_idx_data_user",
            columns: &["data_user"],
        },
    ],
};

pub static STEAM_INVENTORY_HISTORY: TableSchema = TableSchema {
    name: "steam_inventory_history",
    fields: &[
        F::text("ID").key(),
        F::text("trade_id").not_null(),
        F::text("steam_id").not_null(),
        F::text("trade_time"),
        F::datetime("trade_time_timestamp"),
        F::text("trade_type"),
        F::text("trade_partner"),
        F::integer("items_gave_count").default("0"),
        F::integer("items_received_count").default("0"),
        F::text("items_gave_json"),
        F::text("items_received_json"),
        F::text("data_user"),
        F::datetime("created_at"),
    ],
    indexes: &[
        IndexDef {
            name: "steam_inventory_history_idx_steam_id",
            columns: &["steam_id"],
        },
        IndexDef {
            name: "steam_inventory_history_idx_trade_type",
            columns: &["trade_type"],
        },
        IndexDef {
            name: "steam_inventory_history_idx_trade_time",
            columns: &["trade_time_timestamp"],
        },
    ],
};

pub static STEAM_INVENTORYHISTORY_INDEX: TableSchema = TableSchema {
    name: "steam_inventoryhistory_index",
    fields: &[
        F::text("ID").key(),
        F::datetime("order_time"),
        F::text("trade_type"),
        F::text("data_user"),
    ],
    indexes: &[
        IndexDef {
            name: "steam_inventoryhistory_index_idx_order_time",
            columns: &["order_time"],
        },
        IndexDef {
            name: "steam_inventoryhistory_index_idx_trade_type",
            columns: &["trade_type"],
        },
        IndexDef {
            name: "steam_inventoryhistory_index_idx_user",
            columns: &["data_user"],
        },
    ],
};

pub static STEAM_STOCK_COMPONENTS: TableSchema = TableSchema {
    name: "steam_stockComponents",
    fields: &[
        F::text("instanceid").key(),
        F::text("assetid"),
        F::text("classid"),
        F::text("item_name"),
        F::text("weapon_name"),
        F::text("float_range"),
        F::text("weapon_type"),
        F::text("weapon_float"),
        F::text("weapon_level"),
        F::text("data_user"),
        F::text("buy_price"),
        F::text("yyyp_price"),
        F::text("buff_price"),
        F::text("order_time"),
        F::text("steam_price"),
    ],
    indexes: &[
        IndexDef {
            name: "steam_stockComponents_idx_data_user",
            columns: &["data_user"],
        },
        IndexDef {
            name: "steam_stockComponents_idx_weapon_type",
            columns: &["weapon_type"],
        },
        IndexDef {
            name: "steam_stockComponents_idx_order_time",
            columns: &["order_time"],
        },
    ],
};

/// All tables, in creation order.
pub static REGISTRY: &[&TableSchema] = &[
    &CONFIG,
    &FUNDS,
    &BUY,
    &SELL,
    &LEASE,
    &YYYP_BUY,
    &YYYP_SELL,
    &YYYP_LENT,
    &YYYP_MESSAGEBOX,
    &YYYP_WEAPON_CLASS_ID,
    &BUFF_BUY,
    &BUFF_SELL,
    &WEAPON_CLASS_ID,
    &STEAM_BUY,
    &STEAM_SELL,
    &STEAM_INVENTORY,
    &STEAM_INVENTORY_HISTORY,
    &STEAM_INVENTORYHISTORY_INDEX,
    &STEAM_STOCK_COMPONENTS,
];

pub fn lookup(name: &str) -> Option<&'static TableSchema> {
    REGISTRY.iter().copied().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_names_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for table in REGISTRY {
            for index in table.indexes {
                assert!(
                    index.name.starts_with(table.name),
                    "{} not prefixed by {}",
                    index.name,
                    table.name
                );
                assert!(seen.insert(index.name), "duplicate index {}", index.name);
                for col in index.columns {
                    assert!(table.field(col).is_some(), "{}.{} undeclared", table.name, col);
                }
            }
        }
    }

    #[test]
    fn test_buy_has_composite_key() {
        let keys: Vec<_> = BUY.primary_keys().iter().map(|f| f.name).collect();
        assert_eq!(keys, vec!["ID", "from"]);
        assert_eq!(YYYP_BUY.primary_keys().len(), 1);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("yyyp_lent").map(|t| t.name), Some("yyyp_lent"));
        assert!(lookup("nope").is_none());
    }
}
