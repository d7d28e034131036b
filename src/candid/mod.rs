/*!

# The value/type codec

A self-describing binary encoding for typed argument lists. A message is:

```bytes
0-3     magic marker "DIDL"
4..     compound type table (entry count, then entries)
..      argument count, then one type code per argument
..      the argument values, encoded against their resolved types
```

Types are split in two: primitives are small negative opcodes written
inline, compound types (opt/vec/record/variant/func/service) are
deduplicated into the type table and referenced by index. Recursive types
work because a table index is assigned before the entry body is encoded,
so an entry can reference itself through its children.

Field tags are unsigned 32-bit integers, either given explicitly or
derived from a field name with the rolling hash `h = h*223 + byte`.
Records and variants always serialize their fields in ascending tag
order, which is what makes the encoding canonical enough to hash.

*/

pub mod codec;
pub mod label;
pub mod leb128;
pub mod type_table;
pub mod types;
pub mod value;

pub use codec::{decode_args, decode_args_with_types, encode_args};
pub use label::{label_hash, Label};
pub use types::{CompoundType, FuncAnnotation, FuncType, IdlType, ServiceType};
pub use value::{FuncValue, IdlValue};
